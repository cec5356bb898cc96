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

use alloy_primitives::Address;
use parse_display::Display;
use serde::{Deserialize, Serialize};

/// The status of an entity as tracked by the reputation subsystem
#[derive(Display, Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReputationStatus {
    /// Entity is admitted without restriction
    #[default]
    Ok,
    /// New transactions from the entity are capped while pending ones remain
    Throttled,
    /// No transactions from the entity are admitted
    Banned,
}

/// The reputation counters of a single address
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reputation {
    /// Address these counters belong to
    pub address: Address,
    /// Number of admissions referencing the address
    pub txs_seen: u64,
    /// Number of bundled transactions referencing the address
    pub txs_included: u64,
}

/// Tuning constants of the reputation subsystem. All values are configurable;
/// the defaults follow the RIP-7560 reference parameters.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReputationConstants {
    /// Maximum pending transactions of a single unstaked sender
    pub same_sender_mempool_count: u64,
    /// Maximum pending transactions referencing a single unstaked deployer or
    /// paymaster
    pub same_unstaked_entity_mempool_count: u64,
    /// Maximum pending transactions of a throttled entity
    pub throttled_entity_mempool_count: u64,
    /// Maximum transactions of a throttled entity in a single bundle
    pub throttled_entity_bundle_count: u64,
    /// Number of blocks a throttled entity's transaction may stay pending
    pub throttled_entity_live_blocks: u64,
    /// Divisor applied to `txs_seen` to derive the expected inclusion count
    pub min_inclusion_rate_denominator: u64,
    /// Slack before an under-included entity is throttled
    pub throttling_slack: u64,
    /// Slack before an under-included entity is banned
    pub ban_slack: u64,
    /// Minimum stake (wei) for an entity to be considered staked
    pub min_stake_value: u128,
    /// Minimum unstake delay (seconds) for an entity to be considered staked
    pub min_unstake_delay: u64,
}

impl Default for ReputationConstants {
    fn default() -> Self {
        Self {
            same_sender_mempool_count: 4,
            same_unstaked_entity_mempool_count: 11,
            throttled_entity_mempool_count: 4,
            throttled_entity_bundle_count: 4,
            throttled_entity_live_blocks: 10,
            min_inclusion_rate_denominator: 10,
            throttling_slack: 10,
            ban_slack: 50,
            min_stake_value: 2_000_000_000_000_000,
            min_unstake_delay: 86_400,
        }
    }
}
