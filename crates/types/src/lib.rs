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

//! Common types for the Wharf RIP-7560 bundler.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod bundle;
pub use bundle::{GetRip7560BundleArgs, GetRip7560BundleResult};

mod code_hash;
pub use code_hash::ContractCodeHash;

mod entity;
pub use entity::{AccessMode, Entity, EntityType};

mod error;
pub use error::{ErrorKind, FieldViolation, MempoolError, MempoolResult, TraceViolation};

mod fees;
pub use fees::{FeeSnapshot, GasEstimates, GasPrices};

mod reputation;
pub use reputation::{Reputation, ReputationConstants, ReputationStatus};

mod stage;
pub use stage::{
    AdmissionPipeline, AdmissionStage, BatchContext, BatchPipeline, BatchStage, PendingRemoval,
    TxContext,
};

mod timestamp;
pub use timestamp::Timestamp;

mod transaction;
pub use transaction::{
    AaTransaction, AccessListItem, TxId, AA_TX_TYPE, ENTRY_POINT_ADDRESS, MIN_PRICE_BUMP_PERCENT,
};
