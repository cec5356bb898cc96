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

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use anyhow::Context;
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use wharf_types::AaTransaction;

use crate::{
    traits::{AaProvider, EvmProvider},
    types::{Rip7560UsedGas, ValidationPhaseResult, ValidationTraceResult},
    ProviderError, ProviderResult,
};

/// JSON-RPC HTTP client over the execution-layer node
#[derive(Clone, Debug)]
pub struct HttpProvider {
    client: HttpClient,
}

impl HttpProvider {
    /// Connect to the node at the given URL
    pub fn new(url: &str) -> ProviderResult<Self> {
        let client = HttpClientBuilder::default()
            .build(url)
            .context("eth client URL should be valid")?;
        Ok(Self { client })
    }
}

fn map_err(err: ClientError) -> ProviderError {
    ProviderError::Rpc(err.to_string())
}

#[async_trait::async_trait]
impl EvmProvider for HttpProvider {
    async fn chain_id(&self) -> ProviderResult<u64> {
        let id: U64 = self
            .client
            .request("eth_chainId", rpc_params![])
            .await
            .map_err(map_err)?;
        Ok(id.to())
    }

    async fn get_code(&self, address: Address) -> ProviderResult<Bytes> {
        self.client
            .request("eth_getCode", rpc_params![address, "latest"])
            .await
            .map_err(map_err)
    }

    async fn latest_block_number(&self) -> ProviderResult<u64> {
        let number: U64 = self
            .client
            .request("eth_blockNumber", rpc_params![])
            .await
            .map_err(map_err)?;
        Ok(number.to())
    }

    async fn base_fee(&self) -> ProviderResult<Option<U256>> {
        let header: serde_json::Value = self
            .client
            .request("eth_getBlockByNumber", rpc_params!["latest", false])
            .await
            .map_err(map_err)?;
        header
            .get("baseFeePerGas")
            .filter(|fee| !fee.is_null())
            .map(|fee| serde_json::from_value(fee.clone()).context("base fee should be a quantity"))
            .transpose()
            .map_err(Into::into)
    }

    async fn max_priority_fee(&self) -> ProviderResult<U256> {
        self.client
            .request("eth_maxPriorityFeePerGas", rpc_params![])
            .await
            .map_err(map_err)
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        self.client
            .request("eth_gasPrice", rpc_params![])
            .await
            .map_err(map_err)
    }

    async fn block_transaction_hashes(
        &self,
        block_number: u64,
    ) -> ProviderResult<Option<Vec<B256>>> {
        let block: Option<serde_json::Value> = self
            .client
            .request(
                "eth_getBlockByNumber",
                rpc_params![format!("{:#x}", block_number), false],
            )
            .await
            .map_err(map_err)?;
        let Some(block) = block else {
            return Ok(None);
        };
        let hashes = block
            .get("transactions")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .context("block transactions should be a list of hashes")?
            .unwrap_or_default();
        Ok(Some(hashes))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> ProviderResult<Option<serde_json::Value>> {
        self.client
            .request("eth_getTransactionReceipt", rpc_params![tx_hash])
            .await
            .map_err(map_err)
    }
}

#[async_trait::async_trait]
impl AaProvider for HttpProvider {
    async fn call_validation(&self, tx: &AaTransaction) -> ProviderResult<ValidationPhaseResult> {
        self.client
            .request("eth_callRip7560Validation", rpc_params![tx, "latest"])
            .await
            .map_err(map_err)
    }

    async fn trace_validation(&self, tx: &AaTransaction) -> ProviderResult<ValidationTraceResult> {
        self.client
            .request("debug_traceRip7560Validation", rpc_params![tx, "latest"])
            .await
            .map_err(map_err)
    }

    async fn estimate_gas(
        &self,
        tx: &AaTransaction,
        state_override: Option<serde_json::Value>,
    ) -> ProviderResult<Rip7560UsedGas> {
        let params = match state_override {
            Some(overrides) => rpc_params![tx, "latest", overrides],
            None => rpc_params![tx, "latest"],
        };
        self.client
            .request("eth_estimateRip7560TransactionGas", params)
            .await
            .map_err(map_err)
    }

    async fn send_transactions_bundle(
        &self,
        bundle: &[AaTransaction],
        creation_block: U256,
        expected_revenue: U256,
        bundler_id: &str,
    ) -> ProviderResult<B256> {
        self.client
            .request(
                "eth_sendRip7560TransactionsBundle",
                rpc_params![bundle, creation_block, expected_revenue, bundler_id],
            )
            .await
            .map_err(map_err)
    }
}
