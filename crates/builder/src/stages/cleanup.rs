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

use std::sync::Arc;

use async_trait::async_trait;
use wharf_pool::CodeHashCache;
use wharf_types::{BatchContext, BatchStage, MempoolResult};

/// Drops the code-hash snapshots of everything leaving the pool, survivors
/// and evictions alike. Runs last.
pub struct Cleanup {
    cache: Arc<CodeHashCache>,
}

impl Cleanup {
    /// Create the stage over the given snapshot cache
    pub fn new(cache: Arc<CodeHashCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl BatchStage for Cleanup {
    fn name(&self) -> &'static str {
        "checks.clean"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        let hashes: Vec<_> = ctx
            .batch
            .iter()
            .chain(ctx.pending_removal.iter().map(|removal| &removal.tx))
            .map(|tx| tx.tx_hash())
            .collect();
        self.cache.remove(&hashes)
    }
}
