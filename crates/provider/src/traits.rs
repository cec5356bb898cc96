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

use alloy_primitives::{Address, Bytes, B256, U256};
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use wharf_types::AaTransaction;

use crate::{
    types::{Rip7560UsedGas, ValidationPhaseResult, ValidationTraceResult},
    ProviderResult,
};

/// Standard execution-layer reads used across the pipelines
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait::async_trait]
pub trait EvmProvider: Send + Sync + 'static {
    /// Chain id reported by the node
    async fn chain_id(&self) -> ProviderResult<u64>;

    /// Deployed bytecode of the given address
    async fn get_code(&self, address: Address) -> ProviderResult<Bytes>;

    /// Number of the latest block
    async fn latest_block_number(&self) -> ProviderResult<u64>;

    /// Base fee of the latest block, `None` on pre-EIP-1559 networks
    async fn base_fee(&self) -> ProviderResult<Option<U256>>;

    /// Suggested priority fee per gas
    async fn max_priority_fee(&self) -> ProviderResult<U256>;

    /// Suggested legacy gas price
    async fn gas_price(&self) -> ProviderResult<U256>;

    /// Hashes of all transactions in the given block, `None` if the block is
    /// unknown
    async fn block_transaction_hashes(
        &self,
        block_number: u64,
    ) -> ProviderResult<Option<Vec<B256>>>;

    /// Receipt of the given transaction, passed through verbatim
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> ProviderResult<Option<serde_json::Value>>;
}

/// The RIP-7560 methods of the execution-layer node
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait::async_trait]
pub trait AaProvider: Send + Sync + 'static {
    /// `eth_callRip7560Validation`: run the validation phase without state
    /// changes and return the validity windows
    async fn call_validation(&self, tx: &AaTransaction) -> ProviderResult<ValidationPhaseResult>;

    /// `debug_traceRip7560Validation`: run the validation phase under the
    /// collector tracer
    async fn trace_validation(&self, tx: &AaTransaction) -> ProviderResult<ValidationTraceResult>;

    /// `eth_estimateRip7560TransactionGas` with an optional state override set
    async fn estimate_gas(
        &self,
        tx: &AaTransaction,
        state_override: Option<serde_json::Value>,
    ) -> ProviderResult<Rip7560UsedGas>;

    /// `eth_sendRip7560TransactionsBundle`: hand a bundle to the node
    async fn send_transactions_bundle(
        &self,
        bundle: &[AaTransaction],
        creation_block: U256,
        expected_revenue: U256,
        bundler_id: &str,
    ) -> ProviderResult<B256>;
}
