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

//! First-line field validation of incoming transactions.
//!
//! The blockchain lookups fan out concurrently; the checks themselves run in
//! a fixed order so the first failure is deterministic.

use std::sync::Arc;

use alloy_primitives::{Bytes, U256};
use async_trait::async_trait;
use futures::try_join;
use wharf_provider::EvmProvider;
use wharf_types::{
    AaTransaction, AdmissionStage, EntityType, FieldViolation, MempoolError, MempoolResult,
    TxContext, MIN_PRICE_BUMP_PERCENT,
};
use wharf_utils::math;

/// Admission stage running the field validators: sender deployment,
/// paymaster deployment, fee invariants, validation gas cap, and the
/// pending-replacement bump
pub struct FieldChecks<E> {
    evm: Arc<E>,
    max_verification_gas: u64,
}

impl<E> FieldChecks<E> {
    /// Create the stage over the given provider
    pub fn new(evm: Arc<E>, max_verification_gas: u64) -> Self {
        Self {
            evm,
            max_verification_gas,
        }
    }
}

#[async_trait]
impl<E: EvmProvider> AdmissionStage for FieldChecks<E> {
    fn name(&self) -> &'static str {
        "fields.validate"
    }

    async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()> {
        let tx = &ctx.tx;
        if tx.sender.is_zero() {
            return Err(FieldViolation::ZeroSender.into());
        }

        let sender_code = self.evm.get_code(tx.sender);
        let paymaster_code = async {
            match tx.paymaster {
                Some(paymaster) if !tx.paymaster_data.is_empty() => {
                    Ok(Some(self.evm.get_code(paymaster).await?))
                }
                _ => Ok(None),
            }
        };
        let base_fee = self.evm.base_fee();
        let (sender_code, paymaster_code, base_fee) =
            try_join!(sender_code, paymaster_code, base_fee)
                .map_err(|e| MempoolError::Other(anyhow::Error::new(e)))?;

        let mut violations = Vec::new();
        violations.extend(check_sender(tx, &sender_code));
        violations.extend(check_paymaster(tx, paymaster_code.as_ref()));
        violations.extend(check_fees(tx, base_fee));
        violations.extend(check_verification_gas(tx, self.max_verification_gas));
        if let Some(first) = violations.into_iter().next() {
            return Err(first.into());
        }

        check_pending_replacement(tx, ctx.pending_for(EntityType::Account))
    }
}

/// Either the sender is deployed or deployer data is present, never both and
/// never neither
fn check_sender(tx: &AaTransaction, sender_code: &Bytes) -> Option<FieldViolation> {
    if sender_code.is_empty() && tx.deployer_data.is_empty() {
        Some(FieldViolation::SenderNotDeployed(tx.sender))
    } else if !sender_code.is_empty() && !tx.deployer_data.is_empty() {
        Some(FieldViolation::SenderAlreadyDeployed(tx.sender))
    } else {
        None
    }
}

/// Non-empty paymaster data requires a deployed paymaster
fn check_paymaster(tx: &AaTransaction, paymaster_code: Option<&Bytes>) -> Option<FieldViolation> {
    if tx.paymaster_data.is_empty() {
        return None;
    }
    match paymaster_code {
        Some(code) if !code.is_empty() => None,
        _ => Some(FieldViolation::PaymasterNotDeployed(
            tx.paymaster.unwrap_or_default(),
        )),
    }
}

/// `priority <= cap` always; on base-fee networks the cap must reach the
/// current base fee, on legacy networks both fields must be equal
fn check_fees(tx: &AaTransaction, base_fee: Option<U256>) -> Option<FieldViolation> {
    match base_fee {
        None => {
            if tx.max_priority_fee_per_gas != tx.max_fee_per_gas {
                return Some(FieldViolation::LegacyFeesNotEqual);
            }
            None
        }
        Some(base_fee) => {
            if tx.max_priority_fee_per_gas > tx.max_fee_per_gas {
                return Some(FieldViolation::PriorityFeeAboveCap(
                    tx.max_fee_per_gas,
                    tx.max_priority_fee_per_gas,
                ));
            }
            if tx.max_fee_per_gas < base_fee {
                return Some(FieldViolation::MaxFeeBelowBaseFee(
                    tx.max_fee_per_gas,
                    base_fee,
                ));
            }
            None
        }
    }
}

/// The validation gas must stay within the configured bound
fn check_verification_gas(tx: &AaTransaction, max_verification_gas: u64) -> Option<FieldViolation> {
    if tx.validation_gas > max_verification_gas {
        return Some(FieldViolation::VerificationGasTooHigh(
            tx.validation_gas,
            max_verification_gas,
        ));
    }
    None
}

/// A transaction replacing a pending one with the same `(sender, bigNonce)`
/// must bump both fee fields by at least [`MIN_PRICE_BUMP_PERCENT`]
fn check_pending_replacement(
    tx: &AaTransaction,
    pending_sender: &[AaTransaction],
) -> MempoolResult<()> {
    let Some(replaced) = pending_sender
        .iter()
        .find(|pending| pending.big_nonce == tx.big_nonce)
    else {
        return Ok(());
    };

    let min_fee = math::uint_increase_by_percent(replaced.max_fee_per_gas, MIN_PRICE_BUMP_PERCENT);
    let min_priority_fee = math::uint_increase_by_percent(
        replaced.max_priority_fee_per_gas,
        MIN_PRICE_BUMP_PERCENT,
    );
    if tx.max_fee_per_gas < min_fee || tx.max_priority_fee_per_gas < min_priority_fee {
        return Err(MempoolError::ReplacementUnderpriced(MIN_PRICE_BUMP_PERCENT));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;

    fn deployed_tx() -> AaTransaction {
        AaTransaction {
            sender: Address::random(),
            max_fee_per_gas: U256::from(10),
            max_priority_fee_per_gas: U256::from(2),
            ..Default::default()
        }
    }

    #[test]
    fn sender_requires_code_xor_deployer_data() {
        let mut tx = deployed_tx();
        let code = Bytes::from(vec![0x60]);
        let no_code = Bytes::new();

        assert_eq!(check_sender(&tx, &code), None);
        assert_eq!(
            check_sender(&tx, &no_code),
            Some(FieldViolation::SenderNotDeployed(tx.sender))
        );

        tx.deployer_data = Bytes::from(vec![1]);
        assert_eq!(check_sender(&tx, &no_code), None);
        assert_eq!(
            check_sender(&tx, &code),
            Some(FieldViolation::SenderAlreadyDeployed(tx.sender))
        );
    }

    #[test]
    fn paymaster_data_requires_deployed_paymaster() {
        let mut tx = deployed_tx();
        assert_eq!(check_paymaster(&tx, None), None);

        tx.paymaster = Some(Address::random());
        tx.paymaster_data = Bytes::from(vec![1]);
        assert_eq!(
            check_paymaster(&tx, Some(&Bytes::new())),
            Some(FieldViolation::PaymasterNotDeployed(tx.paymaster.unwrap()))
        );
        assert_eq!(check_paymaster(&tx, Some(&Bytes::from(vec![0x60]))), None);
    }

    #[test]
    fn fee_invariants() {
        let mut tx = deployed_tx();

        assert_eq!(check_fees(&tx, Some(U256::from(5))), None);
        assert_eq!(
            check_fees(&tx, Some(U256::from(11))),
            Some(FieldViolation::MaxFeeBelowBaseFee(
                U256::from(10),
                U256::from(11)
            ))
        );

        tx.max_priority_fee_per_gas = U256::from(11);
        assert_eq!(
            check_fees(&tx, Some(U256::from(5))),
            Some(FieldViolation::PriorityFeeAboveCap(
                U256::from(10),
                U256::from(11)
            ))
        );

        // legacy mode requires equal fees
        assert_eq!(
            check_fees(&tx, None),
            Some(FieldViolation::LegacyFeesNotEqual)
        );
        tx.max_priority_fee_per_gas = tx.max_fee_per_gas;
        assert_eq!(check_fees(&tx, None), None);
    }

    #[test]
    fn verification_gas_is_bounded() {
        let mut tx = deployed_tx();
        tx.validation_gas = 100;
        assert_eq!(check_verification_gas(&tx, 100), None);
        assert_eq!(
            check_verification_gas(&tx, 99),
            Some(FieldViolation::VerificationGasTooHigh(100, 99))
        );
    }

    #[test]
    fn replacement_must_bump_both_fees() {
        let pending = deployed_tx();

        let mut replacement = pending.clone();
        replacement.max_fee_per_gas = U256::from(11);
        replacement.max_priority_fee_per_gas = U256::from(3);
        assert!(check_pending_replacement(&replacement, &[pending.clone()]).is_ok());

        // 10% bump on the cap not met
        replacement.max_fee_per_gas = U256::from(10);
        let err = check_pending_replacement(&replacement, &[pending.clone()]).unwrap_err();
        assert!(matches!(err, MempoolError::ReplacementUnderpriced(10)));

        // different bigNonce is not a replacement
        replacement.big_nonce = U256::from(999);
        assert!(check_pending_replacement(&replacement, &[pending]).is_ok());
    }
}
