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

use alloy_primitives::{Address, U256};

use crate::entity::{AccessMode, Entity, EntityType};

/// Result type for pool and pipeline operations
pub type MempoolResult<T> = std::result::Result<T, MempoolError>;

/// Stable error kinds surfaced in RPC error payloads
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A field validation failed
    InvalidFields,
    /// Static validation reverted on the execution layer
    RejectedByEpOrAccount,
    /// Time to expiry was below the admission slack
    ShortDeadline,
    /// A validation trace rule failed
    BannedOpcode,
    /// The reputation gate rejected an entity
    BannedOrThrottledEntity,
    /// An unstaked entity reached its pending-count cap
    InvalidEntityStake,
    /// A replacement did not bump fees enough
    ReplacementUnderpriced,
    /// Store or RPC errors not otherwise mapped
    Internal,
}

impl ErrorKind {
    /// Stable identifier of this kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFields => "INVALID_FIELDS",
            ErrorKind::RejectedByEpOrAccount => "REJECTED_BY_EP_OR_ACCOUNT",
            ErrorKind::ShortDeadline => "SHORT_DEADLINE",
            ErrorKind::BannedOpcode => "BANNED_OPCODE",
            ErrorKind::BannedOrThrottledEntity => "BANNED_OR_THROTTLED_ENTITY",
            ErrorKind::InvalidEntityStake => "INVALID_ENTITY_STAKE",
            ErrorKind::ReplacementUnderpriced => "REPLACEMENT_UNDERPRICED",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// JSON-RPC error code used for this kind
    pub const fn code(&self) -> i32 {
        match self {
            ErrorKind::InvalidFields => -32602,
            ErrorKind::RejectedByEpOrAccount => -32500,
            ErrorKind::BannedOpcode => -32502,
            ErrorKind::ShortDeadline => -32503,
            ErrorKind::BannedOrThrottledEntity => -32504,
            ErrorKind::InvalidEntityStake => -32505,
            ErrorKind::ReplacementUnderpriced => -32000,
            ErrorKind::Internal => -32603,
        }
    }
}

/// Error produced by the admission or bundling pipelines
#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    /// Some other error occurred
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    /// A field validator rejected the transaction
    #[error("invalid fields: {0}")]
    FieldViolation(FieldViolation),
    /// A pending transaction with the same (sender, bigNonce) exists and the
    /// replacement does not bump both fees enough
    #[error("replacement transaction must increase maxFeePerGas and maxPriorityFeePerGas by >= {0}%")]
    ReplacementUnderpriced(u32),
    /// Static validation reverted, carries the revert reason
    #[error("rejected by entry point or account: {0}")]
    RejectedByEpOrAccount(String),
    /// The sender's validity window expires too soon
    #[error("transaction expires too soon")]
    ShortDeadline,
    /// A validation trace rule failed
    #[error("{0}")]
    TraceViolation(TraceViolation),
    /// The entity is banned
    #[error("banned entity: {}", .0.address)]
    EntityBanned(Entity),
    /// The entity is throttled and at its pending cap
    #[error("throttled entity: {}", .0.address)]
    EntityThrottled(Entity),
    /// An unstaked entity reached its pending-count cap
    #[error("unstaked entity: {} exceeds pending transaction limit of {}", .0.address, .1)]
    PendingCountExceeded(Entity, u64),
}

impl MempoolError {
    /// The stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MempoolError::Other(_) => ErrorKind::Internal,
            MempoolError::FieldViolation(_) => ErrorKind::InvalidFields,
            MempoolError::ReplacementUnderpriced(_) => ErrorKind::ReplacementUnderpriced,
            MempoolError::RejectedByEpOrAccount(_) => ErrorKind::RejectedByEpOrAccount,
            MempoolError::ShortDeadline => ErrorKind::ShortDeadline,
            MempoolError::TraceViolation(_) => ErrorKind::BannedOpcode,
            MempoolError::EntityBanned(_) | MempoolError::EntityThrottled(_) => {
                ErrorKind::BannedOrThrottledEntity
            }
            MempoolError::PendingCountExceeded(..) => ErrorKind::InvalidEntityStake,
        }
    }
}

impl From<FieldViolation> for MempoolError {
    fn from(violation: FieldViolation) -> Self {
        MempoolError::FieldViolation(violation)
    }
}

impl From<TraceViolation> for MempoolError {
    fn from(violation: TraceViolation) -> Self {
        MempoolError::TraceViolation(violation)
    }
}

/// All possible field validation failures
#[derive(Clone, Debug, parse_display::Display, Eq, PartialEq, Ord, PartialOrd)]
pub enum FieldViolation {
    /// The sender address is unset or zero
    #[display("sender is required")]
    ZeroSender,
    /// The sender has no code and no deployer data was given
    #[display("sender {0} is not deployed and deployerData is empty")]
    SenderNotDeployed(Address),
    /// The sender has code but deployer data was given anyway
    #[display("sender {0} is already deployed, deployerData must be empty")]
    SenderAlreadyDeployed(Address),
    /// Paymaster data is set but the paymaster has no code
    #[display("paymaster {0} has no code deployed")]
    PaymasterNotDeployed(Address),
    /// The validation gas limit exceeds the configured maximum
    #[display("verificationGasLimit is {0} but must be at most {1}")]
    VerificationGasTooHigh(u64, u64),
    /// The priority fee exceeds the fee cap
    #[display("maxFeePerGas ({0}) must be greater than or equal to maxPriorityFeePerGas ({1})")]
    PriorityFeeAboveCap(U256, U256),
    /// The fee cap does not cover the current base fee
    #[display("maxFeePerGas ({0}) must be greater than or equal to the current base fee ({1})")]
    MaxFeeBelowBaseFee(U256, U256),
    /// On a legacy network both fee fields must be equal
    #[display("legacy fee mode: maxPriorityFeePerGas must equal maxFeePerGas")]
    LegacyFeesNotEqual,
}

/// All possible validation trace failures
#[derive(Clone, Debug, parse_display::Display, Eq, PartialEq)]
pub enum TraceViolation {
    /// An entity ran out of gas during its validation frame
    #[display("{0} ran out of gas during validation")]
    OutOfGas(EntityType),
    /// An entity used an opcode from the banned set
    #[display("{0} uses banned opcode: {1}")]
    UsedBannedOpcode(EntityType, String),
    /// An unstaked entity used a balance-inspecting opcode
    #[display("unstaked {0} uses banned opcode: {1}")]
    UnstakedUsedBannedOpcode(EntityType, String),
    /// An entity inspected the EntryPoint's code
    #[display("{0} has forbidden EXTCODE* access to the EntryPoint")]
    ForbiddenExtCodeAccess(EntityType),
    /// The deployer used CREATE2 more than once, or without deployer data
    #[display("deployer may only use CREATE2 once and only when deployerData is set")]
    DeployerCreate2Misuse,
    /// A non-deployer entity used CREATE2
    #[display("{0} uses banned opcode: CREATE2")]
    NonDeployerUsedCreate2(EntityType),
    /// An entity touched storage it is not allowed to
    #[display("{entity} has forbidden {mode} access to {address} slot {slot}")]
    ForbiddenStorageAccess {
        /// Entity whose frame performed the access
        entity: EntityType,
        /// Read or write
        mode: AccessMode,
        /// Contract whose storage was touched
        address: Address,
        /// Touched slot
        slot: U256,
    },
    /// An unstaked entity wrote a slot associated with itself
    #[display("unstaked {entity} wrote {address} slot {slot} associated with itself")]
    UnstakedAssociatedWrite {
        /// Entity whose frame performed the write
        entity: EntityType,
        /// Contract whose storage was written
        address: Address,
        /// Written slot
        slot: U256,
    },
    /// An unstaked entity touched sender-associated storage while the sender
    /// is mid-deploy
    #[display("unstaked {entity} accessed sender-associated storage during account deployment")]
    AssociatedStorageDuringDeploy {
        /// Entity whose frame performed the access
        entity: EntityType,
    },
    /// An unstaked paymaster returned a non-empty context
    #[display("unstaked paymaster must not return context")]
    UnstakedPaymasterContext,
    /// The trace contained a balance query against the EntryPoint
    #[display("{0} has a forbidden balance call to the EntryPoint")]
    EntryPointBalanceCall(String),
    /// The trace contained a non-zero value transfer to an unknown callee
    #[display("{0} has a forbidden value transfer to {1}")]
    ForbiddenValueTransfer(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_identifiers_are_stable() {
        assert_eq!(ErrorKind::InvalidFields.as_str(), "INVALID_FIELDS");
        assert_eq!(ErrorKind::BannedOrThrottledEntity.as_str(), "BANNED_OR_THROTTLED_ENTITY");
        assert_eq!(
            MempoolError::ShortDeadline.kind().as_str(),
            "SHORT_DEADLINE"
        );
        assert_eq!(
            MempoolError::from(FieldViolation::ZeroSender).kind(),
            ErrorKind::InvalidFields
        );
    }

    #[test]
    fn trace_violation_messages() {
        let violation = TraceViolation::UsedBannedOpcode(EntityType::Account, "NUMBER".into());
        assert_eq!(violation.to_string(), "account uses banned opcode: NUMBER");
    }
}
