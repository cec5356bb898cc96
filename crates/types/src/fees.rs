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

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Gas market values observed at the start of a bundling run. All stages of a
/// single run see the same snapshot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FeeSnapshot {
    /// Base fee of the next block, `None` on networks without EIP-1559
    pub base_fee: Option<U256>,
    /// Suggested priority fee, only meaningful when `base_fee` is set
    pub tip: Option<U256>,
    /// Suggested legacy gas price for networks without a base fee
    pub gas_price: Option<U256>,
}

impl FeeSnapshot {
    /// Whether the snapshot carries base-fee-aware market values
    pub fn is_dynamic(&self) -> bool {
        matches!(self.base_fee, Some(base_fee) if !base_fee.is_zero()) && self.tip.is_some()
    }
}

/// Suggested fee values used to fill in unset transaction fees
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPrices {
    /// Suggested maxFeePerGas
    pub max_fee_per_gas: U256,
    /// Suggested maxPriorityFeePerGas
    pub max_priority_fee_per_gas: U256,
}

/// Result of a gas estimation request
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimates {
    /// Estimated gas for the validation phase
    #[serde(with = "alloy_serde::quantity")]
    pub validation_gas_limit: u64,
    /// Estimated gas for the execution phase
    #[serde(with = "alloy_serde::quantity")]
    pub call_gas_limit: u64,
}
