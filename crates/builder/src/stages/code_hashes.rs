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

use alloy_primitives::keccak256;
use async_trait::async_trait;
use futures::future::try_join_all;
use wharf_pool::CodeHashCache;
use wharf_provider::{EvmProvider, ProviderError};
use wharf_types::{BatchContext, BatchStage, ContractCodeHash, MempoolError, MempoolResult};

/// Reason attached to entries evicted by [`CheckCodeHashes`]
pub(crate) const CODE_HASH_CHANGED_REASON: &str = "code hash changed";

/// Recomputes the bytecode hashes of every contract in each entry's
/// admission-time snapshot and marks entries whose code changed for removal
pub struct CheckCodeHashes<E> {
    evm: Arc<E>,
    cache: Arc<CodeHashCache>,
}

impl<E> CheckCodeHashes<E> {
    /// Create the stage over the given provider and snapshot cache
    pub fn new(evm: Arc<E>, cache: Arc<CodeHashCache>) -> Self {
        Self { evm, cache }
    }
}

impl<E: EvmProvider> CheckCodeHashes<E> {
    async fn has_changed(&self, snapshot: &[ContractCodeHash]) -> MempoolResult<bool> {
        let checks = snapshot.iter().map(|entry| {
            let evm = self.evm.clone();
            async move {
                let code = evm.get_code(entry.address).await?;
                Ok::<_, ProviderError>(keccak256(&code) != entry.code_hash)
            }
        });
        let results = try_join_all(checks)
            .await
            .map_err(|e| MempoolError::Other(anyhow::Error::new(e)))?;
        Ok(results.into_iter().any(|changed| changed))
    }
}

#[async_trait]
impl<E: EvmProvider> BatchStage for CheckCodeHashes<E> {
    fn name(&self) -> &'static str {
        "checks.codeHashes"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        for index in (0..ctx.batch.len()).rev() {
            let tx_hash = ctx.batch[index].tx_hash();
            let Some(snapshot) = self.cache.load(tx_hash)? else {
                continue;
            };
            if self.has_changed(&snapshot).await? {
                ctx.mark_index_for_removal(index, CODE_HASH_CHANGED_REASON);
            }
        }
        Ok(())
    }
}
