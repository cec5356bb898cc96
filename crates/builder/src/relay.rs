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

use std::{collections::HashSet, sync::Arc, time::Duration};

use alloy_primitives::{B256, U256};
use anyhow::anyhow;
use wharf_provider::{AaProvider, EvmProvider};
use wharf_types::{AaTransaction, MempoolError, MempoolResult};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Submits produced bundles to the execution layer and optionally waits for
/// their inclusion.
pub struct Relayer<E, A> {
    evm: Arc<E>,
    aa: Arc<A>,
    bundler_id: String,
    blocks_in_the_future: u64,
    wait_timeout: Duration,
}

impl<E, A> Relayer<E, A>
where
    E: EvmProvider,
    A: AaProvider,
{
    /// Create a relayer. `wait_timeout` of zero disables waiting for
    /// inclusion.
    pub fn new(
        evm: Arc<E>,
        aa: Arc<A>,
        bundler_id: String,
        blocks_in_the_future: u64,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            evm,
            aa,
            bundler_id,
            blocks_in_the_future,
            wait_timeout,
        }
    }

    /// Submit a bundle targeting the next block. Returns the node's bundle
    /// hash.
    pub async fn submit(&self, bundle: &[AaTransaction]) -> MempoolResult<B256> {
        if bundle.is_empty() {
            return Err(MempoolError::Other(anyhow!("refusing to relay an empty bundle")));
        }

        let current_block = self
            .evm
            .latest_block_number()
            .await
            .map_err(|e| MempoolError::Other(e.into()))?;
        let creation_block = U256::from(current_block + 1);
        let expected_revenue = bundle
            .iter()
            .fold(U256::ZERO, |sum, tx| sum.saturating_add(tx.builder_fee));

        let bundle_hash = self
            .aa
            .send_transactions_bundle(bundle, creation_block, expected_revenue, &self.bundler_id)
            .await
            .map_err(|e| MempoolError::Other(e.into()))?;
        tracing::info!(
            bundle_hash = %bundle_hash,
            txs = bundle.len(),
            creation_block = %creation_block,
            "bundle submitted"
        );

        if !self.wait_timeout.is_zero() {
            self.wait_for_inclusion(bundle, current_block).await?;
        }
        Ok(bundle_hash)
    }

    /// Poll new blocks for any of the bundle's transactions, giving up after
    /// the wait timeout or once the block window has passed
    async fn wait_for_inclusion(
        &self,
        bundle: &[AaTransaction],
        submitted_at: u64,
    ) -> MempoolResult<()> {
        let tx_hashes: HashSet<B256> = bundle.iter().map(|tx| tx.tx_hash()).collect();
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        let mut next_block = submitted_at + 1;

        loop {
            let latest = self
                .evm
                .latest_block_number()
                .await
                .map_err(|e| MempoolError::Other(e.into()))?;

            while next_block <= latest {
                let hashes = self
                    .evm
                    .block_transaction_hashes(next_block)
                    .await
                    .map_err(|e| MempoolError::Other(e.into()))?;
                if let Some(hashes) = hashes {
                    if hashes.iter().any(|hash| tx_hashes.contains(hash)) {
                        tracing::info!(block = next_block, "bundle included");
                        return Ok(());
                    }
                }
                next_block += 1;
            }

            if latest > submitted_at + self.blocks_in_the_future {
                tracing::warn!(
                    submitted_at,
                    latest,
                    "bundle not included within the block window"
                );
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("timed out waiting for bundle inclusion");
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use wharf_provider::{MockAaProvider, MockEvmProvider};

    use super::*;

    #[tokio::test]
    async fn submits_with_summed_builder_fees() {
        let mut evm = MockEvmProvider::new();
        evm.expect_latest_block_number().returning(|| Ok(100));

        let mut aa = MockAaProvider::new();
        aa.expect_send_transactions_bundle()
            .withf(|bundle, creation_block, expected_revenue, bundler_id| {
                bundle.len() == 2
                    && *creation_block == U256::from(101)
                    && *expected_revenue == U256::from(7)
                    && bundler_id == "wharf-test"
            })
            .returning(|_, _, _, _| Ok(B256::random()));

        let txs = vec![
            AaTransaction {
                sender: Address::random(),
                builder_fee: U256::from(3),
                ..Default::default()
            },
            AaTransaction {
                sender: Address::random(),
                builder_fee: U256::from(4),
                ..Default::default()
            },
        ];

        // zero timeout: no inclusion wait
        let relayer = Relayer::new(
            Arc::new(evm),
            Arc::new(aa),
            "wharf-test".to_string(),
            6,
            Duration::ZERO,
        );
        relayer.submit(&txs).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_empty_bundle() {
        let relayer = Relayer::new(
            Arc::new(MockEvmProvider::new()),
            Arc::new(MockAaProvider::new()),
            "wharf-test".to_string(),
            6,
            Duration::ZERO,
        );
        assert!(relayer.submit(&[]).await.is_err());
    }
}
