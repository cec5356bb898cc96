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

use std::{collections::HashMap, str::FromStr, sync::Arc};

use alloy_primitives::Address;
use anyhow::Context;
use wharf_store::{join_values, split_values, Store, StoreError, StoreTxn, SEPARATOR};
use wharf_types::{
    MempoolResult, Reputation, ReputationConstants, ReputationStatus, Timestamp,
};

const TXS_COUNT_PREFIX: &str = "entity:txsCount";

/// Hourly shrink divisor of the exponential decay
const DECAY_FACTOR: u64 = 24;

/// Decay stops once both counters fall below this floor
const DECAY_FLOOR: u64 = 24;

fn count_key(address: Address) -> String {
    join_values([TXS_COUNT_PREFIX, &format!("{address:#x}")])
}

fn encode_counts(txs_seen: u64, txs_included: u64, updated_at: Timestamp) -> String {
    join_values([
        &txs_seen.to_string(),
        &txs_included.to_string(),
        &updated_at.to_string(),
    ])
}

fn decode_counts(raw: &[u8]) -> Result<(u64, u64, Timestamp), StoreError> {
    let corrupted = || StoreError::Corrupted(String::from_utf8_lossy(raw).into_owned());
    let text = std::str::from_utf8(raw).map_err(|_| corrupted())?;
    let parts = split_values(text);
    let [seen, included, updated] = parts.as_slice() else {
        return Err(corrupted());
    };
    Ok((
        u64::from_str(seen).map_err(|_| corrupted())?,
        u64::from_str(included).map_err(|_| corrupted())?,
        Timestamp::new(u64::from_str(updated).map_err(|_| corrupted())?),
    ))
}

/// Shrink both counters by 1/24 for each whole hour elapsed, stopping once
/// both fall below the floor
fn decayed_counts(
    txs_seen: u64,
    txs_included: u64,
    updated_at: Timestamp,
    now: Timestamp,
) -> (u64, u64) {
    let mut seen = txs_seen;
    let mut included = txs_included;
    for _ in 0..now.hours_since(updated_at) {
        if seen < DECAY_FLOOR && included < DECAY_FLOOR {
            break;
        }
        seen -= seen / DECAY_FACTOR;
        included -= included / DECAY_FACTOR;
    }
    (seen, included)
}

/// Per-address `(seen, included)` counters with hourly exponential decay,
/// persisted in the store.
///
/// Decay is applied whenever a record is read and the decayed value is
/// written back inside the same transaction, so concurrent readers converge.
#[derive(Debug)]
pub struct ReputationTracker {
    store: Arc<Store>,
    constants: ReputationConstants,
}

impl ReputationTracker {
    /// Create a tracker over the store with the given constants
    pub fn new(store: Arc<Store>, constants: ReputationConstants) -> Self {
        Self { store, constants }
    }

    /// The constants this tracker classifies with
    pub fn constants(&self) -> &ReputationConstants {
        &self.constants
    }

    /// Classify an address after applying decay
    pub fn status(&self, address: Address) -> MempoolResult<ReputationStatus> {
        let now = Timestamp::now();
        let (txs_seen, txs_included) = self
            .store
            .update(|txn| self.read_counts(txn, address, now))
            .context("should read reputation counters")?;
        Ok(self.classify(txs_seen, txs_included))
    }

    /// Increment `seen` for each address, once per address
    pub fn inc_seen(&self, addresses: &[Address]) -> MempoolResult<()> {
        let now = Timestamp::now();
        self.store
            .update(|txn| {
                for &address in addresses {
                    let (seen, included) = self.read_counts(txn, address, now)?;
                    txn.put(count_key(address), encode_counts(seen + 1, included, now))?;
                }
                Ok(())
            })
            .context("should increment seen counters")?;
        Ok(())
    }

    /// Add per-address occurrence counts to `included` after a bundle is
    /// produced
    pub fn inc_included(&self, counts: &HashMap<Address, u64>) -> MempoolResult<()> {
        let now = Timestamp::now();
        self.store
            .update(|txn| {
                for (&address, &count) in counts {
                    let (seen, included) = self.read_counts(txn, address, now)?;
                    txn.put(
                        count_key(address),
                        encode_counts(seen, included + count, now),
                    )?;
                }
                Ok(())
            })
            .context("should increment included counters")?;
        Ok(())
    }

    /// Overwrite the counters of the given addresses (debug)
    pub fn set_overrides(&self, overrides: &[Reputation]) -> MempoolResult<()> {
        let now = Timestamp::now();
        self.store
            .update(|txn| {
                for entry in overrides {
                    txn.put(
                        count_key(entry.address),
                        encode_counts(entry.txs_seen, entry.txs_included, now),
                    )?;
                }
                Ok(())
            })
            .context("should override reputation")?;
        Ok(())
    }

    /// All tracked records, decayed as of now
    pub fn dump(&self) -> MempoolResult<Vec<Reputation>> {
        let now = Timestamp::now();
        let prefix = format!("{TXS_COUNT_PREFIX}{SEPARATOR}");
        let entries = self
            .store
            .prefix_scan(prefix.as_bytes())
            .context("should scan reputation records")?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let address = std::str::from_utf8(&key)
                .ok()
                .and_then(|key| key.rsplit(SEPARATOR).next())
                .and_then(|hex| Address::from_str(hex).ok())
                .context("reputation key should carry an address")?;
            let (seen, included, updated_at) = decode_counts(&value).context("should decode")?;
            let (txs_seen, txs_included) = decayed_counts(seen, included, updated_at, now);
            records.push(Reputation {
                address,
                txs_seen,
                txs_included,
            });
        }
        Ok(records)
    }

    /// Drop every tracked record
    pub fn clear(&self) -> MempoolResult<()> {
        let prefix = format!("{TXS_COUNT_PREFIX}{SEPARATOR}");
        let entries = self
            .store
            .prefix_scan(prefix.as_bytes())
            .context("should scan reputation records")?;
        self.store
            .update(|txn| {
                for (key, _) in &entries {
                    txn.delete(key)?;
                }
                Ok(())
            })
            .context("should clear reputation records")?;
        Ok(())
    }

    /// Read an address's counters inside a transaction, applying decay and
    /// writing the decayed value back
    fn read_counts(
        &self,
        txn: &StoreTxn<'_>,
        address: Address,
        now: Timestamp,
    ) -> Result<(u64, u64), StoreError> {
        let key = count_key(address);
        let Some(raw) = txn.get(&key)? else {
            return Ok((0, 0));
        };
        let (seen, included, updated_at) = decode_counts(&raw)?;
        let (seen, included) = decayed_counts(seen, included, updated_at, now);
        txn.put(&key, encode_counts(seen, included, now))?;
        Ok((seen, included))
    }

    fn classify(&self, txs_seen: u64, txs_included: u64) -> ReputationStatus {
        if txs_seen == 0 {
            return ReputationStatus::Ok;
        }
        let min_expected_included = txs_seen / self.constants.min_inclusion_rate_denominator;
        if min_expected_included <= txs_included + self.constants.throttling_slack {
            ReputationStatus::Ok
        } else if min_expected_included <= txs_included + self.constants.ban_slack {
            ReputationStatus::Throttled
        } else {
            ReputationStatus::Banned
        }
    }
}
