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

//! Wire types of the RIP-7560 validation and tracing methods.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Result of `eth_callRip7560Validation`: the validity windows returned by
/// the account and paymaster validation frames
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationPhaseResult {
    /// Unix time after which the account signature is valid
    #[serde(with = "alloy_serde::quantity")]
    pub sender_valid_after: u64,
    /// Unix time until which the account signature is valid, 0 = unbounded
    #[serde(with = "alloy_serde::quantity")]
    pub sender_valid_until: u64,
    /// Unix time after which the paymaster approval is valid
    #[serde(with = "alloy_serde::quantity")]
    pub paymaster_valid_after: u64,
    /// Unix time until which the paymaster approval is valid, 0 = unbounded
    #[serde(with = "alloy_serde::quantity")]
    pub paymaster_valid_until: u64,
}

/// Read and write counts of one contract's storage during a validation frame
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessInfo {
    /// Slot to the value first read from it
    pub reads: HashMap<U256, U256>,
    /// Slot to the number of writes
    pub writes: HashMap<U256, u64>,
}

/// Code size and access opcode of a contract touched during tracing
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractSizeInfo {
    /// Deployed code size of the contract
    pub contract_size: u64,
    /// Opcode that touched the contract
    pub opcode: String,
}

/// Everything the validation tracer observed within one entity's top-level
/// frame
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityTraceFrame {
    /// Selector of the top-level call into the entity
    pub top_level_method_sig: Bytes,
    /// The entity the frame targets
    pub top_level_target_address: Address,
    /// Opcode usage counts at depth > 1
    pub opcodes: HashMap<String, u64>,
    /// Storage access per touched contract
    pub access: HashMap<Address, AccessInfo>,
    /// Touched contracts and their code sizes
    pub contract_size: HashMap<Address, ContractSizeInfo>,
    /// Contracts inspected via EXTCODE* opcodes
    pub ext_code_access_info: HashMap<Address, String>,
    /// Whether the frame ran out of gas
    pub oog: bool,
}

/// One frame of the internal call list collected during tracing. Enter
/// frames carry `to`/`input`/`value`; exit frames (`RETURN`/`REVERT`) carry
/// `output`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceCall {
    /// Opcode of the frame (CALL, STATICCALL, RETURN, REVERT, ...)
    #[serde(rename = "type")]
    pub call_type: String,
    /// Caller of the frame
    pub from: Address,
    /// Callee, absent on exit frames
    pub to: Option<Address>,
    /// Calldata of an enter frame
    pub input: Bytes,
    /// Return data of an exit frame
    pub output: Bytes,
    /// Value transferred by the frame
    pub value: Option<U256>,
    /// Gas provided to the frame
    #[serde(with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Gas used by the frame
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
}

/// Result of `debug_traceRip7560Validation`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationTraceResult {
    /// One frame per top-level call made by the EntryPoint during validation
    pub calls_from_entry_point: Vec<EntityTraceFrame>,
    /// Preimages of every KECCAK256 computed during validation
    pub keccak: Vec<Bytes>,
    /// Flat list of internal call enter/exit frames
    pub calls: Vec<TraceCall>,
}

/// Result of `eth_estimateRip7560TransactionGas`
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rip7560UsedGas {
    /// Gas used by the validation phase
    #[serde(with = "alloy_serde::quantity")]
    pub validation_gas: u64,
    /// Gas used by the execution phase
    #[serde(with = "alloy_serde::quantity")]
    pub execution_gas: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_result_parses_tracer_output() {
        let raw = r#"{
            "callsFromEntryPoint": [{
                "topLevelMethodSig": "0x19822f7c",
                "topLevelTargetAddress": "0x66658d4e481b0985ad72152bad41569425ff7548",
                "opcodes": {"NUMBER": 1},
                "access": {
                    "0x66658d4e481b0985ad72152bad41569425ff7548": {
                        "reads": {"0x0": "0x1"},
                        "writes": {"0x0": 2}
                    }
                },
                "contractSize": {},
                "extCodeAccessInfo": {},
                "oog": false
            }],
            "keccak": ["0xdead"],
            "calls": [
                {"type": "CALL", "from": "0x0000000000000000000000000000000000007560",
                 "to": "0x66658d4e481b0985ad72152bad41569425ff7548",
                 "input": "0x19822f7c", "gas": "0x5208", "gasUsed": "0x0", "value": "0x0"},
                {"type": "RETURN", "from": "0x0000000000000000000000000000000000000000",
                 "output": "0x", "gas": "0x0", "gasUsed": "0x5208"}
            ]
        }"#;

        let parsed: ValidationTraceResult = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.calls_from_entry_point.len(), 1);
        let frame = &parsed.calls_from_entry_point[0];
        assert_eq!(frame.opcodes.get("NUMBER"), Some(&1));
        assert_eq!(parsed.calls.len(), 2);
        assert_eq!(parsed.calls[0].call_type, "CALL");
        assert!(parsed.calls[1].to.is_none());
    }
}
