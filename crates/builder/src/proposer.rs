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

use std::{sync::Arc, time::Duration};

use alloy_primitives::U256;
use wharf_pool::{CodeHashCache, Mempool, ReputationTracker};
use wharf_provider::EvmProvider;
use wharf_sim::FeeOracle;
use wharf_types::{
    BatchContext, BatchPipeline, GetRip7560BundleArgs, GetRip7560BundleResult, MempoolError,
    MempoolResult,
};

use crate::stages::{
    CheckCodeHashes, Cleanup, DropExpired, FilterUnderpriced, IncIncluded, MaintainGasLimit,
    SortByGasPrice, SortByNonce,
};

/// Assembles bundles on demand: drains the pool FIFO, runs the batch stage
/// chain over one gas-market snapshot, evicts what left the pool, and hands
/// the survivors to the caller.
pub struct Bundler<E> {
    mempool: Arc<Mempool>,
    fee_oracle: FeeOracle<E>,
    pipeline: BatchPipeline,
    chain_id: u64,
}

impl<E: EvmProvider> Bundler<E> {
    /// Create a bundler over an explicit stage chain
    pub fn new(
        mempool: Arc<Mempool>,
        fee_oracle: FeeOracle<E>,
        pipeline: BatchPipeline,
        chain_id: u64,
    ) -> Self {
        Self {
            mempool,
            fee_oracle,
            pipeline,
            chain_id,
        }
    }

    /// Create a bundler with the standard stage order: expiry, gas-price
    /// sort, underpriced filter, nonce sort, gas cap, code-hash recheck,
    /// included counters, snapshot cleanup
    #[allow(clippy::too_many_arguments)]
    pub fn standard(
        mempool: Arc<Mempool>,
        reputation: Arc<ReputationTracker>,
        code_hashes: Arc<CodeHashCache>,
        evm: Arc<E>,
        tx_ttl: Duration,
        max_batch_gas: u64,
        chain_id: u64,
    ) -> Self {
        let pipeline = BatchPipeline::new(vec![
            Arc::new(DropExpired::new(tx_ttl)),
            Arc::new(SortByGasPrice),
            Arc::new(FilterUnderpriced),
            Arc::new(SortByNonce),
            Arc::new(MaintainGasLimit::new(max_batch_gas)),
            Arc::new(CheckCodeHashes::new(evm.clone(), code_hashes.clone())),
            Arc::new(IncIncluded::new(reputation)),
            Arc::new(Cleanup::new(code_hashes)),
        ]);
        Self::new(mempool, FeeOracle::new(evm), pipeline, chain_id)
    }

    /// Produce a bundle for a block builder. Returning the bundle and
    /// evicting it from the pool are one logical step; if the eviction write
    /// fails the survivors are still returned once and the eviction is
    /// retried on the next invocation.
    pub async fn get_bundle(
        &self,
        args: GetRip7560BundleArgs,
    ) -> MempoolResult<GetRip7560BundleResult> {
        let started = std::time::Instant::now();
        let mut result = GetRip7560BundleResult {
            bundle: Vec::new(),
            valid_for_block: U256::from(i64::MAX as u64),
        };

        let mut batch = self.mempool.dump();
        if batch.is_empty() {
            return Ok(result);
        }
        if args.max_bundle_size > 0 && batch.len() as u64 > args.max_bundle_size {
            batch.truncate(args.max_bundle_size as usize);
        }

        let mut fees = self
            .fee_oracle
            .fee_snapshot()
            .await
            .map_err(MempoolError::Other)?;
        // honor the builder's base-fee expectation for the target block
        if !args.min_base_fee.is_zero() {
            if let Some(base_fee) = fees.base_fee {
                fees.base_fee = Some(base_fee.max(args.min_base_fee));
            }
        }

        let mut ctx = BatchContext::new(batch, self.chain_id, fees);
        self.pipeline.run(&mut ctx).await?;

        let mut evicted = ctx.batch.clone();
        let mut dropped_hashes = Vec::with_capacity(ctx.pending_removal.len());
        let mut dropped_reasons = Vec::with_capacity(ctx.pending_removal.len());
        for removal in &ctx.pending_removal {
            evicted.push(removal.tx.clone());
            dropped_hashes.push(format!("{:#x}", removal.tx.tx_hash()));
            dropped_reasons.push(removal.reason.clone());
        }

        if let Err(err) = self.mempool.remove(&evicted) {
            tracing::error!(
                %err,
                "bundle eviction failed, entries will be evicted on the next run"
            );
        }

        let bundle_hashes: Vec<String> = ctx
            .batch
            .iter()
            .map(|tx| format!("{:#x}", tx.tx_hash()))
            .collect();
        result.bundle = ctx.batch;

        metrics::counter!("wharf_bundler_runs").increment(1);
        metrics::gauge!("wharf_bundle_size").set(result.bundle.len() as f64);
        tracing::info!(
            chain_id = self.chain_id,
            batch_aatx_hashes = ?bundle_hashes,
            dropped_aatx_hashes = ?dropped_hashes,
            dropped_aatx_reasons = ?dropped_reasons,
            data = ?ctx.data,
            duration_ms = started.elapsed().as_millis() as u64,
            "bundler run ok"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};
    use wharf_provider::MockEvmProvider;
    use wharf_store::Store;
    use wharf_types::{AaTransaction, ReputationConstants};

    use super::*;

    struct Harness {
        _dir: tempfile::TempDir,
        mempool: Arc<Mempool>,
        reputation: Arc<ReputationTracker>,
        bundler: Bundler<MockEvmProvider>,
    }

    fn harness(base_fee: u64, tip: u64) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let mempool = Arc::new(Mempool::new(store.clone()).unwrap());
        let reputation = Arc::new(ReputationTracker::new(
            store.clone(),
            ReputationConstants::default(),
        ));
        let code_hashes = Arc::new(CodeHashCache::new(store));

        let mut evm = MockEvmProvider::new();
        evm.expect_base_fee()
            .returning(move || Ok(Some(U256::from(base_fee))));
        evm.expect_max_priority_fee()
            .returning(move || Ok(U256::from(tip)));
        evm.expect_gas_price()
            .returning(move || Ok(U256::from(base_fee + tip)));

        let bundler = Bundler::standard(
            mempool.clone(),
            reputation.clone(),
            code_hashes,
            Arc::new(evm),
            Duration::from_secs(180),
            18_000_000,
            1337,
        );
        Harness {
            _dir: dir,
            mempool,
            reputation,
            bundler,
        }
    }

    fn tx(max_fee: u64, priority_fee: u64) -> AaTransaction {
        AaTransaction {
            sender: Address::random(),
            max_fee_per_gas: U256::from(max_fee),
            max_priority_fee_per_gas: U256::from(priority_fee),
            gas: 100_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_pool_produces_empty_bundle() {
        let h = harness(4, 1);
        let result = h
            .bundler
            .get_bundle(GetRip7560BundleArgs {
                max_bundle_size: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(result.bundle.is_empty());
    }

    #[tokio::test]
    async fn full_pipeline_orders_and_filters() {
        let h = harness(4, 1);
        let t1 = tx(4, 3);
        let t2 = tx(5, 2);
        let t3 = tx(6, 1);
        for t in [&t1, &t2, &t3] {
            h.mempool.add(t.clone()).unwrap();
        }

        let result = h
            .bundler
            .get_bundle(GetRip7560BundleArgs::default())
            .await
            .unwrap();

        // at base 4 / tip 1: t1 pays 2 and is filtered (but kept in the
        // pool), t2 and t3 both pay 5 and survive in FIFO order
        assert_eq!(result.bundle, vec![t2.clone(), t3.clone()]);
        assert_eq!(h.mempool.dump(), vec![t1]);

        // survivors counted as included
        let dump = h.reputation.dump().unwrap();
        let included: Vec<_> = dump.iter().filter(|r| r.txs_included == 1).collect();
        assert_eq!(included.len(), 2);
        assert!(included.iter().any(|r| r.address == t2.sender));
        assert!(included.iter().any(|r| r.address == t3.sender));
    }

    #[tokio::test]
    async fn bundle_size_is_bounded() {
        let h = harness(1, 1);
        for _ in 0..5 {
            h.mempool.add(tx(10, 1)).unwrap();
        }

        let result = h
            .bundler
            .get_bundle(GetRip7560BundleArgs {
                max_bundle_size: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.bundle.len(), 2);
        // the rest stays pending
        assert_eq!(h.mempool.len(), 3);
    }
}
