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

use async_trait::async_trait;
use wharf_types::{BatchContext, BatchStage, MempoolResult};

/// Greedily drops the tail of the batch while its total execution gas
/// exceeds the configured limit. Dropped entries stay in the pool.
pub struct MaintainGasLimit {
    max_batch_gas: u64,
}

impl MaintainGasLimit {
    /// Create the stage with the given batch gas cap
    pub fn new(max_batch_gas: u64) -> Self {
        Self { max_batch_gas }
    }
}

#[async_trait]
impl BatchStage for MaintainGasLimit {
    fn name(&self) -> &'static str {
        "batch.maintainGasLimit"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        let mut total: u128 = ctx.batch.iter().map(|tx| tx.gas as u128).sum();
        while total > self.max_batch_gas as u128 {
            let Some(dropped) = ctx.batch.pop() else { break };
            total -= dropped.gas as u128;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use wharf_types::{AaTransaction, FeeSnapshot};

    use super::*;

    fn tx(gas: u64) -> AaTransaction {
        AaTransaction {
            sender: Address::random(),
            gas,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn drops_tail_until_under_limit() {
        let batch = vec![tx(5), tx(4), tx(3)];
        let mut ctx = BatchContext::new(batch.clone(), 1, FeeSnapshot::default());

        MaintainGasLimit::new(9).run(&mut ctx).await.unwrap();
        assert_eq!(ctx.batch, batch[..2].to_vec());
        // dropped entries are not queued for eviction
        assert!(ctx.pending_removal.is_empty());

        let mut ctx = BatchContext::new(batch.clone(), 1, FeeSnapshot::default());
        MaintainGasLimit::new(100).run(&mut ctx).await.unwrap();
        assert_eq!(ctx.batch.len(), 3);
    }
}
