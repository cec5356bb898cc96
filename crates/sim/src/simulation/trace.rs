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

//! Post-processing of the validation tracer output.
//!
//! The tracer reports one frame per top-level call the EntryPoint makes
//! during validation. Each frame is attributed to a known entity of the
//! transaction and checked against the RIP-7560 opcode, storage-access, and
//! internal-call restrictions.

use std::collections::{BTreeSet, HashMap, HashSet};

use alloy_primitives::{keccak256, Address, Bytes, U256};
use anyhow::{anyhow, bail};
use wharf_provider::{EntityTraceFrame, TraceCall, ValidationTraceResult};
use wharf_types::{
    AaTransaction, AccessMode, EntityType, MempoolResult, TraceViolation, ENTRY_POINT_ADDRESS,
};

/// Opcodes no entity may use during validation
pub const BANNED_OPCODES: [&str; 12] = [
    "GASPRICE",
    "GASLIMIT",
    "DIFFICULTY",
    "TIMESTAMP",
    "BASEFEE",
    "BLOCKHASH",
    "NUMBER",
    "ORIGIN",
    "GAS",
    "CREATE",
    "COINBASE",
    "SELFDESTRUCT",
];

/// Opcodes unstaked entities may not use during validation
pub const BANNED_UNSTAKED_OPCODES: [&str; 2] = ["SELFBALANCE", "BALANCE"];

const CREATE2: &str = "CREATE2";

/// A slot is associated with an address when it lies within this offset of a
/// keccak image whose preimage is prefixed by the address
const ASSOCIATED_SLOT_OFFSET: u64 = 128;

fn selector(signature: &str) -> [u8; 4] {
    keccak256(signature.as_bytes())[..4]
        .try_into()
        .expect("keccak output is at least 4 bytes")
}

fn create_account_selector() -> [u8; 4] {
    selector("createAccount(address,uint256)")
}

fn validate_paymaster_selector() -> [u8; 4] {
    selector("validatePaymasterTransaction(uint256,bytes32,bytes)")
}

fn balance_of_selector() -> [u8; 4] {
    selector("balanceOf(address)")
}

/// The RIP-7560 validation restrictions, parameterized by the set of
/// addresses considered staked
#[derive(Clone, Debug, Default)]
pub(crate) struct TraceRules {
    staked: HashSet<Address>,
}

impl TraceRules {
    pub(crate) fn new(staked: HashSet<Address>) -> Self {
        Self { staked }
    }

    fn is_staked(&self, address: Address) -> bool {
        self.staked.contains(&address)
    }

    /// Check every rule over the trace. On success returns the deduplicated
    /// list of contracts the validation touched, in frame order.
    pub(crate) fn validate(
        &self,
        tx: &AaTransaction,
        trace: &ValidationTraceResult,
    ) -> MempoolResult<Vec<Address>> {
        let entities = known_entities(tx, trace);

        let mut touched = Vec::new();
        let mut touched_seen = HashSet::new();
        let mut push_touched = |address: Address| {
            if touched_seen.insert(address) {
                touched.push(address);
            }
        };

        for (kind, address, frame) in &entities {
            let Some(frame) = frame else { continue };
            if frame.oog {
                Err(TraceViolation::OutOfGas(*kind))?;
            }
            if frame.ext_code_access_info.contains_key(&ENTRY_POINT_ADDRESS) {
                Err(TraceViolation::ForbiddenExtCodeAccess(*kind))?;
            }
            for opcode in frame.opcodes.keys() {
                if BANNED_OPCODES.contains(&opcode.as_str()) {
                    Err(TraceViolation::UsedBannedOpcode(*kind, opcode.clone()))?;
                }
                if BANNED_UNSTAKED_OPCODES.contains(&opcode.as_str()) && !self.is_staked(*address)
                {
                    Err(TraceViolation::UnstakedUsedBannedOpcode(
                        *kind,
                        opcode.clone(),
                    ))?;
                }
            }

            push_touched(*address);
            for contract in frame.contract_size.keys() {
                push_touched(*contract);
            }
        }

        self.check_create2(tx, &entities)?;

        let slots_by_entity = associated_slots(tx, &trace.keccak);
        for (kind, address, frame) in &entities {
            let Some(frame) = frame else { continue };
            self.check_storage(tx, *kind, *address, frame, &slots_by_entity)?;
        }

        self.check_calls(tx, &trace.calls)?;

        Ok(touched)
    }

    fn check_create2(
        &self,
        tx: &AaTransaction,
        entities: &[(EntityType, Address, Option<&EntityTraceFrame>)],
    ) -> MempoolResult<()> {
        for (kind, _, frame) in entities {
            let Some(frame) = frame else { continue };
            let Some(&count) = frame.opcodes.get(CREATE2) else {
                continue;
            };
            match kind {
                EntityType::Deployer => {
                    if count > 1 || tx.deployer_data.is_empty() {
                        Err(TraceViolation::DeployerCreate2Misuse)?;
                    }
                }
                _ => Err(TraceViolation::NonDeployerUsedCreate2(*kind))?,
            }
        }
        Ok(())
    }

    fn check_storage(
        &self,
        tx: &AaTransaction,
        kind: EntityType,
        entity_address: Address,
        frame: &EntityTraceFrame,
        slots_by_entity: &HashMap<Address, BTreeSet<U256>>,
    ) -> MempoolResult<()> {
        let empty = BTreeSet::new();
        let sender_slots = slots_by_entity.get(&tx.sender).unwrap_or(&empty);
        let entity_slots = slots_by_entity.get(&entity_address).unwrap_or(&empty);
        // the sender is mid-deploy while its creation is still carried by
        // this transaction
        let sender_mid_deploy = !tx.deployer_data.is_empty();

        for (&accessed, info) in &frame.access {
            if accessed == tx.sender || accessed == ENTRY_POINT_ADDRESS {
                continue;
            }

            let accesses = info
                .reads
                .keys()
                .map(|&slot| (AccessMode::Read, slot))
                .chain(info.writes.keys().map(|&slot| (AccessMode::Write, slot)));

            for (mode, slot) in accesses {
                if is_associated(sender_slots, tx.sender, slot) {
                    if !sender_mid_deploy || entity_address == tx.sender {
                        continue;
                    }
                    if self.is_staked(entity_address) {
                        continue;
                    }
                    Err(TraceViolation::AssociatedStorageDuringDeploy { entity: kind })?;
                } else if accessed == entity_address
                    || is_associated(entity_slots, entity_address, slot)
                {
                    if mode == AccessMode::Read || self.is_staked(entity_address) {
                        continue;
                    }
                    Err(TraceViolation::UnstakedAssociatedWrite {
                        entity: kind,
                        address: accessed,
                        slot,
                    })?;
                } else {
                    Err(TraceViolation::ForbiddenStorageAccess {
                        entity: kind,
                        mode,
                        address: accessed,
                        slot,
                    })?;
                }
            }
        }
        Ok(())
    }

    fn check_calls(&self, tx: &AaTransaction, calls: &[TraceCall]) -> MempoolResult<()> {
        for entry in build_call_entries(calls) {
            if entry.selector == validate_paymaster_selector() {
                let context = decode_paymaster_context(&entry.output)
                    .map_err(|e| anyhow!("unexpected tracing result for tx {}: {e}", tx.tx_hash()))?;
                let paymaster_staked = tx.paymaster.is_some_and(|p| self.is_staked(p));
                if !context.is_empty() && !paymaster_staked {
                    Err(TraceViolation::UnstakedPaymasterContext)?;
                }
            } else if entry.to == ENTRY_POINT_ADDRESS && entry.selector == balance_of_selector() {
                Err(TraceViolation::EntryPointBalanceCall(describe(
                    tx, entry.from,
                )))?;
            } else if !entry.value.is_zero()
                && entry.to != ENTRY_POINT_ADDRESS
                && tx.entity_of(entry.to).is_none()
            {
                Err(TraceViolation::ForbiddenValueTransfer(
                    describe(tx, entry.from),
                    describe(tx, entry.to),
                ))?;
            }
        }
        Ok(())
    }
}

fn known_entities<'a>(
    tx: &AaTransaction,
    trace: &'a ValidationTraceResult,
) -> Vec<(EntityType, Address, Option<&'a EntityTraceFrame>)> {
    [EntityType::Account, EntityType::Deployer, EntityType::Paymaster]
        .into_iter()
        .filter_map(|kind| {
            let address = tx.entity_address(kind)?;
            let frame = trace.calls_from_entry_point.iter().find(|frame| {
                frame.top_level_target_address == address
                    && (kind != EntityType::Deployer
                        || frame.top_level_method_sig.as_ref() == create_account_selector().as_slice())
            });
            Some((kind, address, frame))
        })
        .collect()
}

/// Map each entity to the set of storage slots associated with it: keccak
/// images whose preimage is prefixed by the entity's padded address
fn associated_slots(tx: &AaTransaction, keccak: &[Bytes]) -> HashMap<Address, BTreeSet<U256>> {
    let targets: Vec<Address> = tx.entities().iter().map(|e| e.address).collect();
    let mut slots: HashMap<Address, BTreeSet<U256>> = HashMap::new();
    for preimage in keccak {
        let image = U256::from_be_slice(keccak256(preimage).as_slice());
        for &target in &targets {
            let mut padded = [0u8; 32];
            padded[12..].copy_from_slice(target.as_slice());
            if preimage.starts_with(&padded) {
                slots.entry(target).or_default().insert(image);
            }
        }
    }
    slots
}

fn is_associated(slots: &BTreeSet<U256>, address: Address, slot: U256) -> bool {
    if slot == U256::from_be_slice(address.as_slice()) {
        return true;
    }
    let Some(&start) = slots.range(..=slot).next_back() else {
        return false;
    };
    slot - start <= U256::from(ASSOCIATED_SLOT_OFFSET)
}

struct CallEntry {
    from: Address,
    to: Address,
    value: U256,
    selector: [u8; 4],
    output: Bytes,
}

/// Pair up enter and exit frames of the flat call list. CREATE frames and
/// reverted frames carry no decodable return value and are skipped.
fn build_call_entries(calls: &[TraceCall]) -> Vec<CallEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<&TraceCall> = Vec::new();
    for call in calls {
        if call.call_type == "RETURN" || call.call_type == "REVERT" {
            let Some(top) = stack.pop() else { continue };
            if call.call_type == "REVERT" || top.call_type == "CREATE" || top.call_type == CREATE2
            {
                continue;
            }
            let mut selector = [0u8; 4];
            if top.input.len() >= 4 {
                selector.copy_from_slice(&top.input[..4]);
            }
            entries.push(CallEntry {
                from: top.from,
                to: top.to.unwrap_or_default(),
                value: top.value.unwrap_or_default(),
                selector,
                output: call.output.clone(),
            });
        } else {
            stack.push(call);
        }
    }
    entries
}

/// Decode the single dynamic `bytes` return of
/// `validatePaymasterTransaction`
fn decode_paymaster_context(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 64 {
        bail!("paymaster return data too short: {} bytes", data.len());
    }
    let offset = usize::try_from(U256::from_be_slice(&data[..32]))
        .map_err(|_| anyhow!("paymaster context offset out of range"))?;
    if data.len() < offset + 32 {
        bail!("paymaster context offset out of bounds");
    }
    let length = usize::try_from(U256::from_be_slice(&data[offset..offset + 32]))
        .map_err(|_| anyhow!("paymaster context length out of range"))?;
    let start = offset + 32;
    if data.len() < start + length {
        bail!("paymaster context length out of bounds");
    }
    Ok(data[start..start + length].to_vec())
}

fn describe(tx: &AaTransaction, address: Address) -> String {
    match tx.entity_of(address) {
        Some(kind) => kind.to_str().to_string(),
        None => address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use wharf_provider::AccessInfo;
    use wharf_types::MempoolError;

    use super::*;

    fn tx_with_entities() -> AaTransaction {
        AaTransaction {
            sender: Address::repeat_byte(0x11),
            paymaster: Some(Address::repeat_byte(0x22)),
            paymaster_data: Bytes::from(vec![1]),
            ..Default::default()
        }
    }

    fn frame_for(target: Address) -> EntityTraceFrame {
        EntityTraceFrame {
            top_level_target_address: target,
            ..Default::default()
        }
    }

    fn trace_with_frames(frames: Vec<EntityTraceFrame>) -> ValidationTraceResult {
        ValidationTraceResult {
            calls_from_entry_point: frames,
            ..Default::default()
        }
    }

    fn expect_violation(result: MempoolResult<Vec<Address>>, expected: TraceViolation) {
        match result.unwrap_err() {
            MempoolError::TraceViolation(v) => assert_eq!(v, expected),
            other => panic!("expected trace violation, got {other:?}"),
        }
    }

    #[test]
    fn banned_opcode_is_rejected() {
        let tx = tx_with_entities();
        let mut frame = frame_for(tx.sender);
        frame.opcodes.insert("NUMBER".to_string(), 1);
        let rules = TraceRules::default();

        expect_violation(
            rules.validate(&tx, &trace_with_frames(vec![frame])),
            TraceViolation::UsedBannedOpcode(EntityType::Account, "NUMBER".to_string()),
        );
    }

    #[test]
    fn unstaked_balance_opcode_is_rejected() {
        let tx = tx_with_entities();
        let mut frame = frame_for(tx.paymaster.unwrap());
        frame.opcodes.insert("SELFBALANCE".to_string(), 1);

        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![frame.clone()])),
            TraceViolation::UnstakedUsedBannedOpcode(
                EntityType::Paymaster,
                "SELFBALANCE".to_string(),
            ),
        );

        // staked paymasters may inspect balances
        let rules = TraceRules::new(HashSet::from([tx.paymaster.unwrap()]));
        assert!(rules.validate(&tx, &trace_with_frames(vec![frame])).is_ok());
    }

    #[test]
    fn out_of_gas_is_rejected() {
        let tx = tx_with_entities();
        let mut frame = frame_for(tx.sender);
        frame.oog = true;

        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![frame])),
            TraceViolation::OutOfGas(EntityType::Account),
        );
    }

    #[test]
    fn ext_code_access_to_entry_point_is_rejected() {
        let tx = tx_with_entities();
        let mut frame = frame_for(tx.sender);
        frame
            .ext_code_access_info
            .insert(ENTRY_POINT_ADDRESS, "EXTCODESIZE".to_string());

        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![frame])),
            TraceViolation::ForbiddenExtCodeAccess(EntityType::Account),
        );
    }

    #[test]
    fn create2_rules() {
        let mut tx = tx_with_entities();
        tx.deployer = Some(Address::repeat_byte(0x33));
        tx.deployer_data = Bytes::from(vec![1, 2]);

        let mut deployer_frame = frame_for(tx.deployer.unwrap());
        deployer_frame.top_level_method_sig = Bytes::from(create_account_selector().to_vec());
        deployer_frame.opcodes.insert(CREATE2.to_string(), 1);

        // one CREATE2 with deployer data present is fine
        assert!(TraceRules::default()
            .validate(&tx, &trace_with_frames(vec![deployer_frame.clone()]))
            .is_ok());

        // twice is not
        deployer_frame.opcodes.insert(CREATE2.to_string(), 2);
        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![deployer_frame])),
            TraceViolation::DeployerCreate2Misuse,
        );

        // the account may never use CREATE2
        let mut account_frame = frame_for(tx.sender);
        account_frame.opcodes.insert(CREATE2.to_string(), 1);
        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![account_frame])),
            TraceViolation::NonDeployerUsedCreate2(EntityType::Account),
        );
    }

    #[test]
    fn forbidden_storage_access_is_rejected() {
        let tx = tx_with_entities();
        let stranger = Address::repeat_byte(0x99);
        let mut frame = frame_for(tx.paymaster.unwrap());
        let mut info = AccessInfo::default();
        info.reads.insert(U256::from(5), U256::ZERO);
        frame.access.insert(stranger, info);

        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![frame])),
            TraceViolation::ForbiddenStorageAccess {
                entity: EntityType::Paymaster,
                mode: AccessMode::Read,
                slot: U256::from(5),
                address: stranger,
            },
        );
    }

    #[test]
    fn sender_associated_storage_is_permitted_outside_deployment() {
        let tx = tx_with_entities();
        let stranger = Address::repeat_byte(0x99);

        // preimage prefixed with the padded sender address associates its
        // keccak image with the sender
        let mut preimage = vec![0u8; 12];
        preimage.extend_from_slice(tx.sender.as_slice());
        preimage.extend_from_slice(&[0u8; 32]);
        let preimage = Bytes::from(preimage);
        let slot = U256::from_be_slice(keccak256(&preimage).as_slice());

        let mut frame = frame_for(tx.paymaster.unwrap());
        let mut info = AccessInfo::default();
        info.writes.insert(slot, 1);
        frame.access.insert(stranger, info);

        let trace = ValidationTraceResult {
            calls_from_entry_point: vec![frame],
            keccak: vec![preimage],
            ..Default::default()
        };
        // sender is deployed (no deployer data), so associated access is fine
        assert!(TraceRules::default().validate(&tx, &trace).is_ok());

        // with the sender mid-deploy the same access requires stake
        let mut tx = tx;
        tx.deployer = Some(Address::repeat_byte(0x33));
        tx.deployer_data = Bytes::from(vec![1]);
        expect_violation(
            TraceRules::default().validate(&tx, &trace),
            TraceViolation::AssociatedStorageDuringDeploy {
                entity: EntityType::Paymaster,
            },
        );
    }

    #[test]
    fn own_storage_reads_allowed_writes_need_stake() {
        let tx = tx_with_entities();
        let paymaster = tx.paymaster.unwrap();

        let mut read_frame = frame_for(paymaster);
        let mut info = AccessInfo::default();
        info.reads.insert(U256::from(1), U256::ZERO);
        read_frame.access.insert(paymaster, info);
        assert!(TraceRules::default()
            .validate(&tx, &trace_with_frames(vec![read_frame]))
            .is_ok());

        let mut write_frame = frame_for(paymaster);
        let mut info = AccessInfo::default();
        info.writes.insert(U256::from(1), 1);
        write_frame.access.insert(paymaster, info);
        expect_violation(
            TraceRules::default().validate(&tx, &trace_with_frames(vec![write_frame.clone()])),
            TraceViolation::UnstakedAssociatedWrite {
                entity: EntityType::Paymaster,
                address: paymaster,
                slot: U256::from(1),
            },
        );

        let rules = TraceRules::new(HashSet::from([paymaster]));
        assert!(rules
            .validate(&tx, &trace_with_frames(vec![write_frame]))
            .is_ok());
    }

    #[test]
    fn unstaked_paymaster_context_is_rejected() {
        let tx = tx_with_entities();
        // abi.encode(bytes("x")): offset 0x20, length 1, data
        let mut output = vec![0u8; 64];
        output[31] = 0x20;
        output[63] = 1;
        output.extend_from_slice(&[b'x', 0, 0, 0]);

        let calls = vec![
            TraceCall {
                call_type: "CALL".to_string(),
                from: ENTRY_POINT_ADDRESS,
                to: tx.paymaster,
                input: Bytes::from(validate_paymaster_selector().to_vec()),
                ..Default::default()
            },
            TraceCall {
                call_type: "RETURN".to_string(),
                output: Bytes::from(output),
                ..Default::default()
            },
        ];
        let trace = ValidationTraceResult {
            calls,
            ..Default::default()
        };

        expect_violation(
            TraceRules::default().validate(&tx, &trace),
            TraceViolation::UnstakedPaymasterContext,
        );

        let rules = TraceRules::new(HashSet::from([tx.paymaster.unwrap()]));
        assert!(rules.validate(&tx, &trace).is_ok());
    }

    #[test]
    fn value_transfer_to_unknown_callee_is_rejected() {
        let tx = tx_with_entities();
        let stranger = Address::repeat_byte(0x99);
        let calls = vec![
            TraceCall {
                call_type: "CALL".to_string(),
                from: tx.sender,
                to: Some(stranger),
                value: Some(U256::from(1)),
                ..Default::default()
            },
            TraceCall {
                call_type: "RETURN".to_string(),
                ..Default::default()
            },
        ];
        let trace = ValidationTraceResult {
            calls,
            ..Default::default()
        };

        expect_violation(
            TraceRules::default().validate(&tx, &trace),
            TraceViolation::ForbiddenValueTransfer(
                "account".to_string(),
                stranger.to_string(),
            ),
        );
    }

    #[test]
    fn touched_contracts_are_collected_in_order() {
        let tx = tx_with_entities();
        let helper = Address::repeat_byte(0x44);
        let mut frame = frame_for(tx.sender);
        frame.contract_size.insert(helper, Default::default());

        let touched = TraceRules::default()
            .validate(&tx, &trace_with_frames(vec![frame]))
            .unwrap();
        assert_eq!(touched[0], tx.sender);
        assert!(touched.contains(&helper));
        assert_eq!(touched.len(), 2);
    }
}
