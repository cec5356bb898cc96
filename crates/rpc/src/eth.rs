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

use alloy_primitives::{B256, U64};
use async_trait::async_trait;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use wharf_pool::Admitter;
use wharf_provider::{AaProvider, EvmProvider};
use wharf_sim::FeeOracle;
use wharf_types::{AaTransaction, GasEstimates};

use crate::error::{internal_err, mempool_err};

/// The `eth` namespace
#[rpc(server, namespace = "eth")]
pub trait EthApi {
    /// Admit an AA transaction into the pool, returning its hash
    #[method(name = "sendTransaction")]
    async fn send_transaction(&self, tx: AaTransaction) -> RpcResult<B256>;

    /// Estimate the validation and execution gas of a transaction. When
    /// `maxFeePerGas` is zero the fee fields are filled from the gas oracle
    /// first.
    #[method(name = "estimateGas")]
    async fn estimate_gas(
        &self,
        tx: AaTransaction,
        state_override: Option<serde_json::Value>,
    ) -> RpcResult<GasEstimates>;

    /// Scan the most recent blocks for the transaction and return its
    /// receipt, or null when not found
    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, tx_hash: B256)
        -> RpcResult<Option<serde_json::Value>>;

    /// Canonical hash of the given transaction args
    #[method(name = "getTransactionHash")]
    async fn get_transaction_hash(&self, tx: AaTransaction) -> RpcResult<B256>;

    /// The chain id this bundler serves
    #[method(name = "chainId")]
    async fn chain_id(&self) -> RpcResult<U64>;
}

/// `eth` namespace handler
pub struct EthApi<E, A> {
    admitter: Arc<Admitter>,
    aa: Arc<A>,
    evm: Arc<E>,
    fee_oracle: FeeOracle<E>,
    chain_id: u64,
    receipt_lookup_range: u64,
}

impl<E: EvmProvider, A: AaProvider> EthApi<E, A> {
    /// Create the handler. `receipt_lookup_range` bounds how many recent
    /// blocks `eth_getTransactionReceipt` scans.
    pub fn new(
        admitter: Arc<Admitter>,
        aa: Arc<A>,
        evm: Arc<E>,
        chain_id: u64,
        receipt_lookup_range: u64,
    ) -> Self {
        Self {
            admitter,
            aa,
            fee_oracle: FeeOracle::new(evm.clone()),
            evm,
            chain_id,
            receipt_lookup_range,
        }
    }
}

#[async_trait]
impl<E: EvmProvider, A: AaProvider> EthApiServer for EthApi<E, A> {
    async fn send_transaction(&self, tx: AaTransaction) -> RpcResult<B256> {
        self.admitter.admit(tx).await.map_err(mempool_err)
    }

    async fn estimate_gas(
        &self,
        mut tx: AaTransaction,
        state_override: Option<serde_json::Value>,
    ) -> RpcResult<GasEstimates> {
        // unset fees would revert the simulation on insufficient funds, so
        // fill them in from the oracle for a reliable estimate
        if tx.max_fee_per_gas.is_zero() {
            let prices = self
                .fee_oracle
                .gas_prices()
                .await
                .map_err(|e| internal_err(e.to_string()))?;
            tx.max_fee_per_gas = prices.max_fee_per_gas;
            tx.max_priority_fee_per_gas = prices.max_priority_fee_per_gas;
        }

        let used = self
            .aa
            .estimate_gas(&tx, state_override)
            .await
            .map_err(|e| internal_err(e.to_string()))?;
        Ok(GasEstimates {
            validation_gas_limit: used.validation_gas,
            call_gas_limit: used.execution_gas,
        })
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> RpcResult<Option<serde_json::Value>> {
        let latest = self
            .evm
            .latest_block_number()
            .await
            .map_err(|e| internal_err(e.to_string()))?;

        let start = latest.saturating_sub(self.receipt_lookup_range);
        for number in start..=latest {
            let Some(hashes) = self
                .evm
                .block_transaction_hashes(number)
                .await
                .map_err(|e| internal_err(e.to_string()))?
            else {
                continue;
            };
            if hashes.contains(&tx_hash) {
                return self
                    .evm
                    .transaction_receipt(tx_hash)
                    .await
                    .map_err(|e| internal_err(e.to_string()));
            }
        }
        Ok(None)
    }

    async fn get_transaction_hash(&self, tx: AaTransaction) -> RpcResult<B256> {
        Ok(tx.tx_hash())
    }

    async fn chain_id(&self) -> RpcResult<U64> {
        Ok(U64::from(self.chain_id))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use wharf_provider::{MockAaProvider, MockEvmProvider, Rip7560UsedGas};
    use wharf_store::Store;
    use wharf_types::AdmissionPipeline;

    use super::*;

    fn eth_api(
        evm: MockEvmProvider,
        aa: MockAaProvider,
    ) -> (tempfile::TempDir, EthApi<MockEvmProvider, MockAaProvider>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let mempool = Arc::new(wharf_pool::Mempool::new(store).unwrap());
        let admitter = Arc::new(Admitter::new(mempool, AdmissionPipeline::default(), 1337));
        (dir, EthApi::new(admitter, Arc::new(aa), Arc::new(evm), 1337, 6))
    }

    #[tokio::test]
    async fn estimate_gas_fills_zero_fees_from_oracle() {
        let mut evm = MockEvmProvider::new();
        evm.expect_base_fee()
            .returning(|| Ok(Some(U256::from(100))));
        evm.expect_max_priority_fee().returning(|| Ok(U256::from(2)));
        evm.expect_gas_price().returning(|| Ok(U256::from(102)));

        let mut aa = MockAaProvider::new();
        aa.expect_estimate_gas()
            .withf(|tx, _| tx.max_fee_per_gas == U256::from(202))
            .returning(|_, _| {
                Ok(Rip7560UsedGas {
                    validation_gas: 50_000,
                    execution_gas: 80_000,
                })
            });

        let (_dir, api) = eth_api(evm, aa);
        let estimates = api
            .estimate_gas(AaTransaction::default(), None)
            .await
            .unwrap();
        assert_eq!(estimates.validation_gas_limit, 50_000);
        assert_eq!(estimates.call_gas_limit, 80_000);
    }

    #[tokio::test]
    async fn receipt_scan_is_bounded_to_recent_blocks() {
        let tx_hash = B256::random();
        let receipt = serde_json::json!({ "transactionHash": tx_hash });

        let mut evm = MockEvmProvider::new();
        evm.expect_latest_block_number().returning(|| Ok(100));
        evm.expect_block_transaction_hashes()
            .returning(move |number| {
                if number == 97 {
                    Ok(Some(vec![tx_hash]))
                } else {
                    Ok(Some(vec![]))
                }
            });
        let expected = receipt.clone();
        evm.expect_transaction_receipt()
            .returning(move |_| Ok(Some(expected.clone())));

        let (_dir, api) = eth_api(evm, MockAaProvider::new());
        let found = api.get_transaction_receipt(tx_hash).await.unwrap();
        assert_eq!(found, Some(receipt));

        let missing = api.get_transaction_receipt(B256::random()).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn chain_id_is_served() {
        let (_dir, api) = eth_api(MockEvmProvider::new(), MockAaProvider::new());
        assert_eq!(api.chain_id().await.unwrap(), U64::from(1337));
    }
}
