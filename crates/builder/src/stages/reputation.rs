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

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::Address;
use async_trait::async_trait;
use wharf_pool::ReputationTracker;
use wharf_types::{BatchContext, BatchStage, MempoolResult};

/// Adds per-entity occurrence counts of the surviving batch to the
/// `included` counters. Runs after all filtering stages.
pub struct IncIncluded {
    reputation: Arc<ReputationTracker>,
}

impl IncIncluded {
    /// Create the stage over the given tracker
    pub fn new(reputation: Arc<ReputationTracker>) -> Self {
        Self { reputation }
    }
}

#[async_trait]
impl BatchStage for IncIncluded {
    fn name(&self) -> &'static str {
        "reputation.incIncluded"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        let mut counts: HashMap<Address, u64> = HashMap::new();
        for tx in &ctx.batch {
            for entity in tx.entities() {
                *counts.entry(entity.address).or_default() += 1;
            }
        }
        if counts.is_empty() {
            return Ok(());
        }
        self.reputation.inc_included(&counts)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use wharf_store::Store;
    use wharf_types::{AaTransaction, FeeSnapshot, ReputationConstants};

    use super::*;

    #[tokio::test]
    async fn counts_every_entity_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let reputation = Arc::new(ReputationTracker::new(
            store,
            ReputationConstants::default(),
        ));

        let sender = Address::random();
        let paymaster = Address::random();
        let mut first = AaTransaction {
            sender,
            paymaster: Some(paymaster),
            ..Default::default()
        };
        let mut second = first.clone();
        first.big_nonce = U256::from(1);
        second.big_nonce = U256::from(2);

        let stage = IncIncluded::new(reputation.clone());
        let mut ctx = BatchContext::new(vec![first, second], 1, FeeSnapshot::default());
        stage.run(&mut ctx).await.unwrap();

        let mut dump = reputation.dump().unwrap();
        dump.sort_by_key(|r| r.address);
        assert_eq!(dump.len(), 2);
        assert!(dump.iter().all(|r| r.txs_included == 2));
    }
}
