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

//! Stage contracts for the admission and bundling pipelines.
//!
//! Both pipelines are chains of named stages composed left-to-right; the
//! first stage error aborts the run. Stages borrow their context mutably for
//! the duration of the call and must not hold it across suspension points of
//! their own making.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    entity::EntityType,
    error::MempoolResult,
    fees::FeeSnapshot,
    transaction::AaTransaction,
};

/// A transaction marked for eviction by a batch stage, with the reason used
/// for logging
#[derive(Clone, Debug)]
pub struct PendingRemoval {
    /// The transaction to evict
    pub tx: AaTransaction,
    /// Why it is being evicted
    pub reason: String,
}

/// Mutable context of a single bundling run, passed through all batch stages
#[derive(Debug)]
pub struct BatchContext {
    /// The current working list of transactions
    pub batch: Vec<AaTransaction>,
    /// Transactions removed from the working list that must also be evicted
    /// from the pool
    pub pending_removal: Vec<PendingRemoval>,
    /// Chain id of the run
    pub chain_id: u64,
    /// Gas market snapshot taken at the start of the run
    pub fees: FeeSnapshot,
    /// Arbitrary key/value pairs to enrich the run's log record
    pub data: HashMap<String, serde_json::Value>,
}

impl BatchContext {
    /// Create a context over a copy of the given batch
    pub fn new(batch: Vec<AaTransaction>, chain_id: u64, fees: FeeSnapshot) -> Self {
        Self {
            batch,
            pending_removal: Vec::new(),
            chain_id,
            fees,
            data: HashMap::new(),
        }
    }

    /// Remove the transaction at `index` from the working list and queue it
    /// for eviction with the given reason. Out-of-range indices are ignored.
    pub fn mark_index_for_removal(&mut self, index: usize, reason: impl Into<String>) {
        if index >= self.batch.len() {
            return;
        }
        let tx = self.batch.remove(index);
        self.pending_removal.push(PendingRemoval {
            tx,
            reason: reason.into(),
        });
    }

    /// Attach a key/value pair to the run's log record
    pub fn log_data(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }
}

/// Mutable context of a single admission, passed through all admission stages
#[derive(Debug)]
pub struct TxContext {
    /// The incoming transaction
    pub tx: AaTransaction,
    /// Chain id of the admission
    pub chain_id: u64,
    pending_sender: Vec<AaTransaction>,
    pending_deployer: Vec<AaTransaction>,
    pending_paymaster: Vec<AaTransaction>,
}

impl TxContext {
    /// Create a context carrying the pending pool slices for each entity the
    /// transaction references
    pub fn new(
        tx: AaTransaction,
        chain_id: u64,
        pending_sender: Vec<AaTransaction>,
        pending_deployer: Vec<AaTransaction>,
        pending_paymaster: Vec<AaTransaction>,
    ) -> Self {
        Self {
            tx,
            chain_id,
            pending_sender,
            pending_deployer,
            pending_paymaster,
        }
    }

    /// Pending transactions sharing the given entity with this transaction
    pub fn pending_for(&self, kind: EntityType) -> &[AaTransaction] {
        match kind {
            EntityType::Account => &self.pending_sender,
            EntityType::Deployer => &self.pending_deployer,
            EntityType::Paymaster => &self.pending_paymaster,
        }
    }
}

/// A named stage of the admission pipeline
#[async_trait]
pub trait AdmissionStage: Send + Sync + 'static {
    /// Name of the stage, used in trace logging
    fn name(&self) -> &'static str;

    /// Run the stage over the admission context
    async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()>;
}

/// A named stage of the bundling pipeline
#[async_trait]
pub trait BatchStage: Send + Sync + 'static {
    /// Name of the stage, used in trace logging
    fn name(&self) -> &'static str;

    /// Run the stage over the batch context
    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()>;
}

/// An ordered chain of admission stages, short-circuiting on the first error
#[derive(Clone, Default)]
pub struct AdmissionPipeline {
    stages: Vec<Arc<dyn AdmissionStage>>,
}

impl AdmissionPipeline {
    /// Create a pipeline from the given stages
    pub fn new(stages: Vec<Arc<dyn AdmissionStage>>) -> Self {
        Self { stages }
    }

    /// Run all stages in order over the context
    pub async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()> {
        for stage in &self.stages {
            tracing::trace!(stage = stage.name(), tx = %ctx.tx.id(), "running admission stage");
            stage.run(ctx).await?;
        }
        Ok(())
    }
}

/// An ordered chain of batch stages, short-circuiting on the first error
#[derive(Clone, Default)]
pub struct BatchPipeline {
    stages: Vec<Arc<dyn BatchStage>>,
}

impl BatchPipeline {
    /// Create a pipeline from the given stages
    pub fn new(stages: Vec<Arc<dyn BatchStage>>) -> Self {
        Self { stages }
    }

    /// Run all stages in order over the context
    pub async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        for stage in &self.stages {
            tracing::trace!(stage = stage.name(), batch_len = ctx.batch.len(), "running batch stage");
            stage.run(ctx).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;
    use crate::error::MempoolError;

    struct Tag(&'static str, bool);

    #[async_trait]
    impl BatchStage for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
            ctx.log_data(self.0, true);
            if self.1 {
                return Err(MempoolError::ShortDeadline);
            }
            Ok(())
        }
    }

    fn tx_with_sender(sender: Address) -> AaTransaction {
        AaTransaction {
            sender,
            ..Default::default()
        }
    }

    #[test]
    fn mark_index_for_removal_moves_tx() {
        let txs = vec![
            tx_with_sender(Address::random()),
            tx_with_sender(Address::random()),
            tx_with_sender(Address::random()),
        ];
        let mut ctx = BatchContext::new(txs.clone(), 1, FeeSnapshot::default());

        ctx.mark_index_for_removal(1, "testing");
        assert_eq!(ctx.batch, vec![txs[0].clone(), txs[2].clone()]);
        assert_eq!(ctx.pending_removal.len(), 1);
        assert_eq!(ctx.pending_removal[0].tx, txs[1]);
        assert_eq!(ctx.pending_removal[0].reason, "testing");

        // out of range is a no-op
        ctx.mark_index_for_removal(10, "nope");
        assert_eq!(ctx.batch.len(), 2);
        assert_eq!(ctx.pending_removal.len(), 1);
    }

    #[tokio::test]
    async fn batch_pipeline_short_circuits() {
        let pipeline = BatchPipeline::new(vec![
            Arc::new(Tag("first", false)),
            Arc::new(Tag("second", true)),
            Arc::new(Tag("third", false)),
        ]);
        let mut ctx = BatchContext::new(vec![], 1, FeeSnapshot::default());

        let err = pipeline.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, MempoolError::ShortDeadline));
        assert!(ctx.data.contains_key("first"));
        assert!(ctx.data.contains_key("second"));
        assert!(!ctx.data.contains_key("third"));
    }
}
