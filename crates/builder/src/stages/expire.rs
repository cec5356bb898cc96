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

use std::{collections::HashMap, time::Duration};

use alloy_primitives::B256;
use async_trait::async_trait;
use parking_lot::Mutex;
use wharf_types::{BatchContext, BatchStage, MempoolResult, Timestamp};

/// Reason attached to entries evicted by [`DropExpired`]
pub(crate) const EXPIRED_REASON: &str = "transaction expired";

/// Tracks when each transaction hash was first observed by a bundling run
/// and marks entries older than the TTL for removal
pub struct DropExpired {
    ttl: Duration,
    seen_at: Mutex<HashMap<B256, Timestamp>>,
}

impl DropExpired {
    /// Create the stage with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen_at: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn seed(&self, hash: B256, first_seen: Timestamp) {
        self.seen_at.lock().insert(hash, first_seen);
    }
}

#[async_trait]
impl BatchStage for DropExpired {
    fn name(&self) -> &'static str {
        "expire.dropExpired"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        let now = Timestamp::now();
        let mut seen_at = self.seen_at.lock();
        for index in (0..ctx.batch.len()).rev() {
            let hash = ctx.batch[index].tx_hash();
            match seen_at.get(&hash) {
                None => {
                    seen_at.insert(hash, now);
                }
                Some(&first_seen) if first_seen + self.ttl < now => {
                    seen_at.remove(&hash);
                    ctx.mark_index_for_removal(index, EXPIRED_REASON);
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
