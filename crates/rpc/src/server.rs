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

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use jsonrpsee::{server::ServerBuilder, RpcModule};
use wharf_builder::Bundler;
use wharf_pool::{Admitter, Mempool, ReputationTracker};
use wharf_provider::{AaProvider, EvmProvider};

use crate::{
    aa::{AaApi, AaApiServer},
    debug::{DebugApi, DebugApiServer},
    eth::{EthApi, EthApiServer},
};

/// Everything the RPC server serves
pub struct ApiSet<E, A> {
    /// Admission entry point for `eth_sendTransaction`
    pub admitter: Arc<Admitter>,
    /// Bundle producer for `aa_getRip7560Bundle`
    pub bundler: Arc<Bundler<E>>,
    /// Pool shared with the debug namespace
    pub mempool: Arc<Mempool>,
    /// Reputation tracker shared with the debug namespace
    pub reputation: Arc<ReputationTracker>,
    /// RIP-7560 provider for estimation
    pub aa: Arc<A>,
    /// Standard execution-layer reads
    pub evm: Arc<E>,
    /// Chain id served by `eth_chainId`
    pub chain_id: u64,
    /// Blocks scanned by `eth_getTransactionReceipt`
    pub receipt_lookup_range: u64,
    /// Whether the `debug` namespace is enabled
    pub debug_mode: bool,
}

/// Start the JSON-RPC server on `addr` and return its handle. The caller is
/// responsible for stopping it on shutdown.
pub async fn serve<E: EvmProvider, A: AaProvider>(
    addr: SocketAddr,
    apis: ApiSet<E, A>,
) -> anyhow::Result<jsonrpsee::server::ServerHandle> {
    let mut module = RpcModule::new(());
    module
        .merge(
            EthApi::new(
                apis.admitter,
                apis.aa,
                apis.evm,
                apis.chain_id,
                apis.receipt_lookup_range,
            )
            .into_rpc(),
        )
        .context("eth namespace should merge")?;
    module
        .merge(AaApi::new(apis.bundler).into_rpc())
        .context("aa namespace should merge")?;
    module
        .merge(DebugApi::new(apis.debug_mode, apis.mempool, apis.reputation).into_rpc())
        .context("debug namespace should merge")?;

    let server = ServerBuilder::default()
        .build(addr)
        .await
        .context("rpc server should bind")?;
    tracing::info!(%addr, "rpc server listening");
    Ok(server.start(module))
}
