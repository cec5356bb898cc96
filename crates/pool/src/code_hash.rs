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

use alloy_primitives::B256;
use anyhow::Context;
use wharf_store::{join_values, Store};
use wharf_types::{ContractCodeHash, MempoolResult};

const CODE_HASHES_PREFIX: &str = "checks:codeHashes";

fn snapshot_key(tx_hash: B256) -> String {
    join_values([CODE_HASHES_PREFIX, &format!("{tx_hash:#x}")])
}

/// Persisted code-hash snapshots, keyed by transaction hash.
///
/// A snapshot is written once at admission and checked again at bundling to
/// detect bytecode that changed after simulation.
#[derive(Debug)]
pub struct CodeHashCache {
    store: Arc<Store>,
}

impl CodeHashCache {
    /// Create a cache over the store
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist a transaction's snapshot
    pub fn save(&self, tx_hash: B256, hashes: &[ContractCodeHash]) -> MempoolResult<()> {
        let value = serde_json::to_vec(hashes).context("snapshot should encode")?;
        self.store
            .put(snapshot_key(tx_hash), value)
            .context("should persist code-hash snapshot")?;
        Ok(())
    }

    /// Load a transaction's snapshot, `None` when absent
    pub fn load(&self, tx_hash: B256) -> MempoolResult<Option<Vec<ContractCodeHash>>> {
        let Some(raw) = self
            .store
            .get(snapshot_key(tx_hash))
            .context("should read code-hash snapshot")?
        else {
            return Ok(None);
        };
        let hashes = serde_json::from_slice(&raw).context("snapshot should decode")?;
        Ok(Some(hashes))
    }

    /// Drop the snapshots of the given transactions
    pub fn remove(&self, tx_hashes: &[B256]) -> MempoolResult<()> {
        self.store
            .update(|txn| {
                for &tx_hash in tx_hashes {
                    txn.delete(snapshot_key(tx_hash))?;
                }
                Ok(())
            })
            .context("should remove code-hash snapshots")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;

    #[test]
    fn save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CodeHashCache::new(Arc::new(Store::open(dir.path()).unwrap()));

        let tx_hash = B256::random();
        let snapshot = vec![ContractCodeHash {
            address: Address::random(),
            code_hash: B256::random(),
        }];

        assert_eq!(cache.load(tx_hash).unwrap(), None);
        cache.save(tx_hash, &snapshot).unwrap();
        assert_eq!(cache.load(tx_hash).unwrap(), Some(snapshot));

        cache.remove(&[tx_hash]).unwrap();
        assert_eq!(cache.load(tx_hash).unwrap(), None);
    }
}
