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

mod trace;
pub(crate) use trace::TraceRules;
pub use trace::{BANNED_OPCODES, BANNED_UNSTAKED_OPCODES};

use std::{collections::HashSet, sync::Arc};

use alloy_primitives::{keccak256, Address};
use futures::future::try_join_all;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use wharf_provider::{AaProvider, EvmProvider, ValidationPhaseResult};
use wharf_types::{
    AaTransaction, ContractCodeHash, MempoolError, MempoolResult, Timestamp,
};

/// Seconds of remaining validity an admitted transaction must have
pub const DEADLINE_SLACK_SECS: u64 = 30;

/// Successful result of validating a transaction against the execution layer
#[derive(Clone, Debug, Default)]
pub struct SimulationSummary {
    /// Unix time until which the account signature is valid, 0 = unbounded
    pub sender_valid_until: u64,
    /// Bytecode hashes of every contract touched during validation tracing
    pub code_hashes: Vec<ContractCodeHash>,
}

/// Validates AA transactions through the execution layer's simulation and
/// tracing methods
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait::async_trait]
pub trait Simulator: Send + Sync + 'static {
    /// Run both the static validation and the validation trace, returning
    /// the captured code-hash snapshot on success
    async fn simulate_validation(&self, tx: &AaTransaction) -> MempoolResult<SimulationSummary>;
}

/// [`Simulator`] over an execution-layer node
#[derive(Debug)]
pub struct SimulatorImpl<E, A> {
    evm: Arc<E>,
    aa: Arc<A>,
    rules: TraceRules,
}

impl<E, A> SimulatorImpl<E, A>
where
    E: EvmProvider,
    A: AaProvider,
{
    /// Create a simulator. `staked_entities` are addresses exempt from the
    /// unstaked-entity trace restrictions.
    pub fn new(evm: Arc<E>, aa: Arc<A>, staked_entities: HashSet<Address>) -> Self {
        Self {
            evm,
            aa,
            rules: TraceRules::new(staked_entities),
        }
    }

    async fn static_validation(
        &self,
        tx: &AaTransaction,
    ) -> MempoolResult<ValidationPhaseResult> {
        let result = self
            .aa
            .call_validation(tx)
            .await
            .map_err(|e| MempoolError::RejectedByEpOrAccount(e.to_string()))?;

        if result.sender_valid_until != 0 {
            let now = Timestamp::now().seconds_since_epoch();
            if now >= result.sender_valid_until.saturating_sub(DEADLINE_SLACK_SECS) {
                return Err(MempoolError::ShortDeadline);
            }
        }
        Ok(result)
    }

    async fn trace_validation(&self, tx: &AaTransaction) -> MempoolResult<Vec<Address>> {
        let trace = self
            .aa
            .trace_validation(tx)
            .await
            .map_err(|e| MempoolError::Other(anyhow::Error::new(e)))?;
        self.rules.validate(tx, &trace)
    }

    async fn fetch_code_hashes(
        &self,
        touched: Vec<Address>,
    ) -> MempoolResult<Vec<ContractCodeHash>> {
        let fetches = touched.into_iter().map(|address| {
            let evm = self.evm.clone();
            async move {
                let code = evm.get_code(address).await?;
                Ok(ContractCodeHash {
                    address,
                    code_hash: keccak256(&code),
                })
            }
        });
        try_join_all(fetches)
            .await
            .map_err(|e: wharf_provider::ProviderError| MempoolError::Other(anyhow::Error::new(e)))
    }
}

#[async_trait::async_trait]
impl<E, A> Simulator for SimulatorImpl<E, A>
where
    E: EvmProvider,
    A: AaProvider,
{
    async fn simulate_validation(&self, tx: &AaTransaction) -> MempoolResult<SimulationSummary> {
        let (phase, touched) =
            futures::try_join!(self.static_validation(tx), self.trace_validation(tx))?;
        let code_hashes = self.fetch_code_hashes(touched).await?;

        tracing::debug!(
            tx = %tx.tx_hash(),
            contracts = code_hashes.len(),
            "validation simulation passed"
        );
        Ok(SimulationSummary {
            sender_valid_until: phase.sender_valid_until,
            code_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;
    use wharf_provider::{
        MockAaProvider, MockEvmProvider, ValidationTraceResult,
    };

    use super::*;

    fn simulator(
        evm: MockEvmProvider,
        aa: MockAaProvider,
    ) -> SimulatorImpl<MockEvmProvider, MockAaProvider> {
        SimulatorImpl::new(Arc::new(evm), Arc::new(aa), HashSet::new())
    }

    fn valid_tx() -> AaTransaction {
        AaTransaction {
            sender: Address::repeat_byte(0x11),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn passes_and_captures_code_hashes() {
        let tx = valid_tx();
        let sender = tx.sender;

        let mut aa = MockAaProvider::new();
        aa.expect_call_validation()
            .returning(|_| Ok(ValidationPhaseResult::default()));
        aa.expect_trace_validation().returning(move |_| {
            Ok(ValidationTraceResult {
                calls_from_entry_point: vec![wharf_provider::EntityTraceFrame {
                    top_level_target_address: sender,
                    ..Default::default()
                }],
                ..Default::default()
            })
        });

        let mut evm = MockEvmProvider::new();
        evm.expect_get_code()
            .returning(|_| Ok(Bytes::from(vec![0x60, 0x80])));

        let summary = simulator(evm, aa).simulate_validation(&tx).await.unwrap();
        assert_eq!(summary.code_hashes.len(), 1);
        assert_eq!(summary.code_hashes[0].address, sender);
        assert_eq!(
            summary.code_hashes[0].code_hash,
            keccak256([0x60, 0x80])
        );
    }

    #[tokio::test]
    async fn rejects_short_deadline() {
        let tx = valid_tx();

        let mut aa = MockAaProvider::new();
        aa.expect_call_validation().returning(|_| {
            Ok(ValidationPhaseResult {
                // expired long ago
                sender_valid_until: 1,
                ..Default::default()
            })
        });
        aa.expect_trace_validation()
            .returning(|_| Ok(ValidationTraceResult::default()));

        let err = simulator(MockEvmProvider::new(), aa)
            .simulate_validation(&tx)
            .await
            .unwrap_err();
        assert!(matches!(err, MempoolError::ShortDeadline));
    }

    #[tokio::test]
    async fn maps_validation_revert() {
        let tx = valid_tx();

        let mut aa = MockAaProvider::new();
        aa.expect_call_validation().returning(|_| {
            Err(wharf_provider::ProviderError::Rpc(
                "execution reverted: AA23".to_string(),
            ))
        });
        aa.expect_trace_validation()
            .returning(|_| Ok(ValidationTraceResult::default()));

        let err = simulator(MockEvmProvider::new(), aa)
            .simulate_validation(&tx)
            .await
            .unwrap_err();
        match err {
            MempoolError::RejectedByEpOrAccount(msg) => {
                assert!(msg.contains("AA23"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
