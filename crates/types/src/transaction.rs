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

use std::fmt::Display;

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{BufMut, Encodable, Header, EMPTY_STRING_CODE};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType};

/// Transaction type byte of a RIP-7560 account-abstraction transaction
pub const AA_TX_TYPE: u8 = 0x04;

/// The AA entry point address fixed by RIP-7560
pub const ENTRY_POINT_ADDRESS: Address = address!("0000000000000000000000000000000000007560");

/// Minimum percentage both fee fields must be bumped by to replace a pending
/// transaction with the same (sender, bigNonce)
pub const MIN_PRICE_BUMP_PERCENT: u32 = 10;

/// An entry of an EIP-2930 style access list attached to an AA transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Accessed account
    pub address: Address,
    /// Accessed storage keys of the account
    pub storage_keys: Vec<B256>,
}

/// A RIP-7560 account-abstraction transaction.
///
/// This is the canonical schema used on the wire, in the mempool, and in the
/// persisted store. Immutable once admitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AaTransaction {
    /// The smart contract account sending this transaction
    pub sender: Address,
    /// Small per-sender nonce, used as an ordering hint within a bundle
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Two-dimensional nonce, the uniqueness dimension for replacement
    pub big_nonce: U256,
    /// Maximum total fee per gas
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas, must not exceed `max_fee_per_gas`
    pub max_priority_fee_per_gas: U256,
    /// Execution phase gas limit
    #[serde(with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Account validation phase gas limit
    #[serde(rename = "verificationGasLimit", with = "alloy_serde::quantity")]
    pub validation_gas: u64,
    /// Paymaster validation phase gas limit
    #[serde(rename = "paymasterVerificationGasLimit", with = "alloy_serde::quantity")]
    pub paymaster_gas: u64,
    /// Paymaster post-op phase gas limit
    #[serde(rename = "paymasterPostOpGasLimit", with = "alloy_serde::quantity")]
    pub post_op_gas: u64,
    /// Extra fee paid directly to the block builder
    pub builder_fee: U256,
    /// Account factory, set iff the sender is not yet deployed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Calldata passed to the deployer
    pub deployer_data: Bytes,
    /// Paymaster covering gas for this transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Calldata passed to the paymaster's validation function
    pub paymaster_data: Bytes,
    /// Calldata of the execution phase
    #[serde(alias = "callData")]
    pub execution_data: Bytes,
    /// Account signature over the transaction
    #[serde(alias = "signature")]
    pub authorization_data: Bytes,
    /// Chain id the transaction is bound to
    #[serde(skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    pub chain_id: Option<u64>,
    /// Optional access list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
}

impl AaTransaction {
    /// Primary key of this transaction in the pool
    pub fn id(&self) -> TxId {
        TxId {
            sender: self.sender,
            big_nonce: self.big_nonce,
        }
    }

    /// Canonical transaction hash: keccak of the type-prefixed RLP encoding
    pub fn tx_hash(&self) -> B256 {
        let mut payload = Vec::new();
        self.rlp_payload(&mut payload);

        let mut buf = Vec::with_capacity(payload.len() + 4);
        buf.push(AA_TX_TYPE);
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut buf);
        buf.extend_from_slice(&payload);
        keccak256(&buf)
    }

    /// The effective gas price this transaction pays on a block with the given
    /// base fee: `min(baseFee + maxPriorityFeePerGas, maxFeePerGas)`
    pub fn dynamic_gas_price(&self, base_fee: U256) -> U256 {
        (base_fee.saturating_add(self.max_priority_fee_per_gas)).min(self.max_fee_per_gas)
    }

    /// All entities referenced by this transaction
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities = vec![Entity::new(EntityType::Account, self.sender)];
        if let Some(deployer) = self.deployer {
            entities.push(Entity::new(EntityType::Deployer, deployer));
        }
        if let Some(paymaster) = self.paymaster {
            entities.push(Entity::new(EntityType::Paymaster, paymaster));
        }
        entities
    }

    /// Address playing the given role on this transaction, if any
    pub fn entity_address(&self, kind: EntityType) -> Option<Address> {
        match kind {
            EntityType::Account => Some(self.sender),
            EntityType::Deployer => self.deployer,
            EntityType::Paymaster => self.paymaster,
        }
    }

    /// Role played by the given address on this transaction, if any
    pub fn entity_of(&self, address: Address) -> Option<EntityType> {
        if address == self.sender {
            Some(EntityType::Account)
        } else if self.deployer == Some(address) {
            Some(EntityType::Deployer)
        } else if self.paymaster == Some(address) {
            Some(EntityType::Paymaster)
        } else {
            None
        }
    }

    fn rlp_payload(&self, out: &mut Vec<u8>) {
        self.chain_id.unwrap_or_default().encode(out);
        self.big_nonce.encode(out);
        self.nonce.encode(out);
        self.sender.encode(out);
        encode_optional_address(self.deployer, out);
        self.deployer_data.encode(out);
        encode_optional_address(self.paymaster, out);
        self.paymaster_data.encode(out);
        self.execution_data.encode(out);
        self.builder_fee.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.validation_gas.encode(out);
        self.paymaster_gas.encode(out);
        self.post_op_gas.encode(out);
        self.gas.encode(out);
        self.authorization_data.encode(out);
    }
}

fn encode_optional_address(address: Option<Address>, out: &mut Vec<u8>) {
    match address {
        Some(address) => address.encode(out),
        None => out.put_u8(EMPTY_STRING_CODE),
    }
}

/// Unique identity of an AA transaction in the pool: `(sender, bigNonce)`.
/// Inserting a transaction with the id of a pending one is a replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId {
    /// Sender of the transaction
    pub sender: Address,
    /// Big nonce of the transaction
    pub big_nonce: U256,
}

impl Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:#x}", self.sender, self.big_nonce)
    }
}
