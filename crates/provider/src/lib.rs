// This file is part of Wharf.
//
// Wharf is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Wharf is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Wharf.
// If not, see https://www.gnu.org/licenses/.

//! Typed surface over the execution-layer node.
//!
//! Two traits split the surface: [`EvmProvider`] for standard `eth_*` reads
//! and [`AaProvider`] for the RIP-7560 validation, tracing, estimation, and
//! bundle submission methods. The [`HttpProvider`] implements both over a
//! JSON-RPC HTTP client.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod http;
pub use http::HttpProvider;

mod traits;
#[cfg(any(test, feature = "test-utils"))]
pub use traits::{MockAaProvider, MockEvmProvider};
pub use traits::{AaProvider, EvmProvider};

mod types;
pub use types::{
    AccessInfo, ContractSizeInfo, EntityTraceFrame, Rip7560UsedGas, TraceCall,
    ValidationPhaseResult, ValidationTraceResult,
};

/// Error produced by a provider call
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The node returned an RPC-level error, message carries any revert data
    #[error("{0}")]
    Rpc(String),
    /// Transport or decoding failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
