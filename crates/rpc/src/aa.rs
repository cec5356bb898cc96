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

use std::sync::Arc;

use async_trait::async_trait;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use wharf_builder::Bundler;
use wharf_provider::EvmProvider;
use wharf_types::{GetRip7560BundleArgs, GetRip7560BundleResult};

use crate::error::mempool_err;

/// The `aa` namespace served to block builders
#[rpc(server, namespace = "aa")]
pub trait AaApi {
    /// Assemble a bundle from the pending pool
    #[method(name = "getRip7560Bundle")]
    async fn get_rip7560_bundle(
        &self,
        args: GetRip7560BundleArgs,
    ) -> RpcResult<GetRip7560BundleResult>;
}

/// `aa` namespace handler
pub struct AaApi<E> {
    bundler: Arc<Bundler<E>>,
}

impl<E: EvmProvider> AaApi<E> {
    /// Create the handler over the given bundler
    pub fn new(bundler: Arc<Bundler<E>>) -> Self {
        Self { bundler }
    }
}

#[async_trait]
impl<E: EvmProvider> AaApiServer for AaApi<E> {
    async fn get_rip7560_bundle(
        &self,
        args: GetRip7560BundleArgs,
    ) -> RpcResult<GetRip7560BundleResult> {
        self.bundler.get_bundle(args).await.map_err(mempool_err)
    }
}
