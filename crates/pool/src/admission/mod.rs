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

//! The admission pipeline: every incoming transaction runs through an
//! ordered chain of stages before it is inserted into the pool.

mod checks;
pub use checks::FieldChecks;

mod reputation;
pub use reputation::{CheckStatus, IncSeen, ValidateLimit};

mod simulate;
pub use simulate::Simulate;

use std::sync::Arc;

use alloy_primitives::B256;
use wharf_provider::EvmProvider;
use wharf_sim::Simulator;
use wharf_types::{AaTransaction, AdmissionPipeline, MempoolResult, TxContext};

use crate::{code_hash::CodeHashCache, mempool::Mempool, reputation::ReputationTracker};

/// Admits incoming AA transactions into the pool.
///
/// A transaction runs through the stage chain exactly once; on success it is
/// inserted into the mempool (replacing a keyed entry if one exists).
pub struct Admitter {
    mempool: Arc<Mempool>,
    pipeline: AdmissionPipeline,
    chain_id: u64,
}

impl Admitter {
    /// Create an admitter over an explicit stage chain
    pub fn new(mempool: Arc<Mempool>, pipeline: AdmissionPipeline, chain_id: u64) -> Self {
        Self {
            mempool,
            pipeline,
            chain_id,
        }
    }

    /// Create an admitter with the standard stage order: reputation status
    /// gate, pending-count limits, field validation, simulation, seen
    /// increment
    pub fn standard<E: EvmProvider, S: Simulator>(
        mempool: Arc<Mempool>,
        reputation: Arc<ReputationTracker>,
        code_hashes: Arc<CodeHashCache>,
        evm: Arc<E>,
        simulator: Arc<S>,
        chain_id: u64,
        max_verification_gas: u64,
    ) -> Self {
        let pipeline = AdmissionPipeline::new(vec![
            Arc::new(CheckStatus::new(reputation.clone())),
            Arc::new(ValidateLimit::new(reputation.clone())),
            Arc::new(FieldChecks::new(evm, max_verification_gas)),
            Arc::new(Simulate::new(simulator, code_hashes)),
            Arc::new(IncSeen::new(reputation)),
        ]);
        Self::new(mempool, pipeline, chain_id)
    }

    /// Run the pipeline over the transaction and insert it on success,
    /// returning its hash
    pub async fn admit(&self, tx: AaTransaction) -> MempoolResult<B256> {
        let tx_hash = tx.tx_hash();

        let pending_sender = self.mempool.by_sender(tx.sender);
        let pending_deployer = tx
            .deployer
            .map(|deployer| self.mempool.by_deployer(deployer))
            .unwrap_or_default();
        let pending_paymaster = tx
            .paymaster
            .map(|paymaster| self.mempool.by_paymaster(paymaster))
            .unwrap_or_default();

        let mut ctx = TxContext::new(
            tx,
            self.chain_id,
            pending_sender,
            pending_deployer,
            pending_paymaster,
        );

        if let Err(err) = self.pipeline.run(&mut ctx).await {
            metrics::counter!("wharf_admissions_rejected").increment(1);
            tracing::warn!(tx = %tx_hash, kind = err.kind().as_str(), %err, "transaction rejected");
            return Err(err);
        }

        self.mempool.add(ctx.tx)?;
        metrics::counter!("wharf_admissions_accepted").increment(1);
        tracing::info!(tx = %tx_hash, "transaction admitted");
        Ok(tx_hash)
    }

    /// The pool this admitter inserts into
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }
}
