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

use std::{collections::HashSet, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wharf_builder::{Bundler, Relayer};
use wharf_pool::{Admitter, CodeHashCache, Mempool, ReputationTracker};
use wharf_provider::{EvmProvider, HttpProvider};
use wharf_rpc::ApiSet;
use wharf_sim::SimulatorImpl;
use wharf_store::Store;
use wharf_types::{GetRip7560BundleArgs, ReputationConstants};

/// How often the relay loop tries to produce and submit a bundle
const RELAY_INTERVAL: Duration = Duration::from_secs(12);

#[derive(Debug, Parser)]
#[command(name = "wharf", about = "RIP-7560 account-abstraction bundler", version)]
struct Cli {
    /// Port of the JSON-RPC server
    #[arg(long, env = "PORT", default_value_t = 7560)]
    port: u16,

    /// Directory holding the embedded database
    #[arg(long, env = "DATA_DIRECTORY", default_value = "/tmp/bundler")]
    data_directory: PathBuf,

    /// URL of the execution-layer node
    #[arg(long, env = "ETH_CLIENT_URL")]
    eth_client_url: String,

    /// Private key identifying this bundler towards builders
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Maximum validation gas accepted on a single transaction
    #[arg(long, env = "MAX_VERIFICATION_GAS", default_value_t = 6_000_000)]
    max_verification_gas: u64,

    /// Execution gas cap of a produced bundle
    #[arg(long, env = "MAX_BATCH_GAS_LIMIT", default_value_t = 18_000_000)]
    max_batch_gas_limit: u64,

    /// Seconds a pending transaction may sit in the pool before expiring
    #[arg(long, env = "MAX_TX_TTL_SECONDS", default_value_t = 180)]
    max_tx_ttl_seconds: u64,

    /// Block window used for receipt lookups and bundle inclusion waits
    #[arg(long, env = "BLOCKS_IN_THE_FUTURE", default_value_t = 6)]
    blocks_in_the_future: u64,

    /// Enable the debug_bundler_* RPC namespace
    #[arg(long, env = "DEBUG_MODE", default_value_t = false)]
    debug_mode: bool,

    /// When set, bundles are also pushed to this builder URL on an interval
    #[arg(long, env = "ETH_BUILDER_URL")]
    eth_builder_url: Option<String>,

    /// Seconds to wait for a relayed bundle's inclusion, 0 disables waiting
    #[arg(long, env = "BUNDLE_WAIT_TIMEOUT_SECONDS", default_value_t = 30)]
    bundle_wait_timeout_seconds: u64,

    #[command(flatten)]
    reputation: ReputationArgs,
}

#[derive(Debug, clap::Args)]
struct ReputationArgs {
    #[arg(long, env = "SAME_SENDER_MEMPOOL_COUNT", default_value_t = 4)]
    same_sender_mempool_count: u64,

    #[arg(long, env = "SAME_UNSTAKED_ENTITY_MEMPOOL_COUNT", default_value_t = 11)]
    same_unstaked_entity_mempool_count: u64,

    #[arg(long, env = "THROTTLED_ENTITY_MEMPOOL_COUNT", default_value_t = 4)]
    throttled_entity_mempool_count: u64,

    #[arg(long, env = "THROTTLED_ENTITY_BUNDLE_COUNT", default_value_t = 4)]
    throttled_entity_bundle_count: u64,

    #[arg(long, env = "THROTTLED_ENTITY_LIVE_BLOCKS", default_value_t = 10)]
    throttled_entity_live_blocks: u64,

    #[arg(long, env = "MIN_INCLUSION_RATE_DENOMINATOR", default_value_t = 10)]
    min_inclusion_rate_denominator: u64,

    #[arg(long, env = "THROTTLING_SLACK", default_value_t = 10)]
    throttling_slack: u64,

    #[arg(long, env = "BAN_SLACK", default_value_t = 50)]
    ban_slack: u64,

    #[arg(long, env = "MIN_STAKE_VALUE", default_value_t = 2_000_000_000_000_000)]
    min_stake_value: u128,

    #[arg(long, env = "MIN_UNSTAKE_DELAY", default_value_t = 86_400)]
    min_unstake_delay: u64,
}

impl ReputationArgs {
    fn constants(&self) -> ReputationConstants {
        ReputationConstants {
            same_sender_mempool_count: self.same_sender_mempool_count,
            same_unstaked_entity_mempool_count: self.same_unstaked_entity_mempool_count,
            throttled_entity_mempool_count: self.throttled_entity_mempool_count,
            throttled_entity_bundle_count: self.throttled_entity_bundle_count,
            throttled_entity_live_blocks: self.throttled_entity_live_blocks,
            min_inclusion_rate_denominator: self.min_inclusion_rate_denominator,
            throttling_slack: self.throttling_slack,
            ban_slack: self.ban_slack,
            min_stake_value: self.min_stake_value,
            min_unstake_delay: self.min_unstake_delay,
        }
    }
}

/// Parse the CLI, wire the components, and serve until ctrl-c
pub(crate) async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let signer: PrivateKeySigner = cli
        .private_key
        .parse()
        .context("PRIVATE_KEY should be a valid secp256k1 key")?;
    let bundler_id = format!("{:#x}", signer.address());
    tracing::info!(bundler = %bundler_id, "starting wharf");

    let store = Arc::new(Store::open(&cli.data_directory).context("store should open")?);
    let provider = Arc::new(HttpProvider::new(&cli.eth_client_url)?);
    let chain_id = provider
        .chain_id()
        .await
        .context("eth client should report its chain id")?;
    tracing::info!(chain_id, "connected to execution layer");

    let constants = cli.reputation.constants();
    let mempool = Arc::new(Mempool::new(store.clone())?);
    let reputation = Arc::new(ReputationTracker::new(store.clone(), constants));
    let code_hashes = Arc::new(CodeHashCache::new(store.clone()));

    let simulator = Arc::new(SimulatorImpl::new(
        provider.clone(),
        provider.clone(),
        HashSet::new(),
    ));
    let admitter = Arc::new(Admitter::standard(
        mempool.clone(),
        reputation.clone(),
        code_hashes.clone(),
        provider.clone(),
        simulator,
        chain_id,
        cli.max_verification_gas,
    ));
    let bundler = Arc::new(Bundler::standard(
        mempool.clone(),
        reputation.clone(),
        code_hashes,
        provider.clone(),
        Duration::from_secs(cli.max_tx_ttl_seconds),
        cli.max_batch_gas_limit,
        chain_id,
    ));

    let relay_task = match &cli.eth_builder_url {
        Some(builder_url) => {
            let builder_provider = Arc::new(HttpProvider::new(builder_url)?);
            let relayer = Relayer::new(
                builder_provider.clone(),
                builder_provider,
                bundler_id,
                cli.blocks_in_the_future,
                Duration::from_secs(cli.bundle_wait_timeout_seconds),
            );
            let bundler = bundler.clone();
            let max_batch_gas_limit = cli.max_batch_gas_limit;
            Some(tokio::spawn(async move {
                let mut tick = tokio::time::interval(RELAY_INTERVAL);
                loop {
                    tick.tick().await;
                    let args = GetRip7560BundleArgs {
                        max_bundle_gas: max_batch_gas_limit,
                        ..Default::default()
                    };
                    match bundler.get_bundle(args).await {
                        Ok(result) if result.bundle.is_empty() => {}
                        Ok(result) => {
                            if let Err(err) = relayer.submit(&result.bundle).await {
                                tracing::error!(%err, "bundle relay failed");
                            }
                        }
                        Err(err) => tracing::error!(%err, "bundler run failed"),
                    }
                }
            }))
        }
        None => None,
    };

    let addr: SocketAddr = format!("0.0.0.0:{}", cli.port).parse()?;
    let handle = wharf_rpc::serve(
        addr,
        ApiSet {
            admitter,
            bundler,
            mempool,
            reputation,
            aa: provider.clone(),
            evm: provider,
            chain_id,
            receipt_lookup_range: cli.blocks_in_the_future,
            debug_mode: cli.debug_mode,
        },
    )
    .await?;

    tokio::signal::ctrl_c()
        .await
        .context("should listen for ctrl-c")?;
    tracing::info!("received ctrl-c, shutting down");

    if let Some(task) = relay_task {
        task.abort();
    }
    let _ = handle.stop();
    handle.stopped().await;

    tracing::info!("shutdown complete");
    Ok(())
}
