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

use std::collections::HashMap;

use alloy_primitives::Address;
use async_trait::async_trait;
use wharf_types::{BatchContext, BatchStage, MempoolResult};

/// Enforces ascending nonce order among entries of the same sender while
/// leaving the relative order of different senders untouched
pub struct SortByNonce;

#[async_trait]
impl BatchStage for SortByNonce {
    fn name(&self) -> &'static str {
        "batch.sortByNonce"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        let mut positions_by_sender: HashMap<Address, Vec<usize>> = HashMap::new();
        for (index, tx) in ctx.batch.iter().enumerate() {
            positions_by_sender.entry(tx.sender).or_default().push(index);
        }

        for positions in positions_by_sender.values() {
            if positions.len() < 2 {
                continue;
            }
            let mut txs: Vec<_> = positions.iter().map(|&i| ctx.batch[i].clone()).collect();
            txs.sort_by_key(|tx| tx.nonce);
            for (&position, tx) in positions.iter().zip(txs) {
                ctx.batch[position] = tx;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use wharf_types::{AaTransaction, FeeSnapshot};

    use super::*;

    fn tx(sender: Address, nonce: u64) -> AaTransaction {
        AaTransaction {
            sender,
            nonce,
            big_nonce: U256::from(nonce),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn same_sender_entries_are_nonce_ordered_in_place() {
        let a = Address::random();
        let b = Address::random();
        let batch = vec![tx(a, 2), tx(b, 5), tx(a, 1)];
        let mut ctx = BatchContext::new(batch, 1, FeeSnapshot::default());

        SortByNonce.run(&mut ctx).await.unwrap();
        // sender a's entries swap into nonce order, b keeps its slot
        assert_eq!(ctx.batch, vec![tx(a, 1), tx(b, 5), tx(a, 2)]);
    }
}
