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

mod pool;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{anyhow, Context};
use parking_lot::RwLock;
use pool::PoolInner;
use wharf_store::{join_values, Store, SEPARATOR};
use wharf_types::{AaTransaction, MempoolError, MempoolResult};

const MEMPOOL_PREFIX: &str = "mempool";

fn tx_key(tx: &AaTransaction) -> String {
    join_values([
        MEMPOOL_PREFIX,
        &format!("{:#x}", tx.sender),
        &format!("{:#x}", tx.nonce),
        &format!("{:#x}", tx.big_nonce),
    ])
}

/// Pool of pending AA transactions which have passed all admission checks.
///
/// Entries are persisted to the store before the in-memory indices are
/// touched; a store failure leaves the indices unchanged. On startup the
/// persisted entries are re-inserted in the store's ordered iteration.
#[derive(Debug)]
pub struct Mempool {
    store: Arc<Store>,
    inner: RwLock<PoolInner>,
}

impl Mempool {
    /// Bind a pool to the store and reload any persisted entries
    pub fn new(store: Arc<Store>) -> MempoolResult<Self> {
        let mut inner = PoolInner::default();
        let prefix = format!("{MEMPOOL_PREFIX}{SEPARATOR}");
        let entries = store
            .prefix_scan(prefix.as_bytes())
            .context("should load mempool entries from the store")?;
        for (key, value) in entries {
            let tx: AaTransaction = serde_json::from_slice(&value).map_err(|_| {
                MempoolError::Other(anyhow!(
                    "corrupted mempool entry at key {}",
                    String::from_utf8_lossy(&key)
                ))
            })?;
            inner.add(tx);
        }
        tracing::info!(count = inner.len(), "mempool reloaded from store");

        let mempool = Self {
            store,
            inner: RwLock::new(inner),
        };
        mempool.record_size();
        Ok(mempool)
    }

    /// Add a transaction, replacing any pending one with the same
    /// `(sender, bigNonce)`
    pub fn add(&self, tx: AaTransaction) -> MempoolResult<()> {
        let value = serde_json::to_vec(&tx).context("tx should encode")?;
        self.store
            .put(tx_key(&tx), value)
            .context("should persist mempool entry")?;
        self.inner.write().add(tx);
        self.record_size();
        Ok(())
    }

    /// Remove the given transactions
    pub fn remove(&self, txs: &[AaTransaction]) -> MempoolResult<()> {
        self.store
            .update(|txn| {
                for tx in txs {
                    txn.delete(tx_key(tx))?;
                }
                Ok(())
            })
            .context("should delete mempool entries")?;

        let mut inner = self.inner.write();
        for tx in txs {
            inner.remove(&tx.id());
        }
        drop(inner);
        self.record_size();
        Ok(())
    }

    /// Pending transactions with the given sender, ascending by `bigNonce`
    pub fn by_sender(&self, sender: Address) -> Vec<AaTransaction> {
        self.txs_for(sender)
    }

    /// Pending transactions referencing the given deployer, in arrival order
    pub fn by_deployer(&self, deployer: Address) -> Vec<AaTransaction> {
        self.txs_for(deployer)
    }

    /// Pending transactions referencing the given paymaster, in arrival order
    pub fn by_paymaster(&self, paymaster: Address) -> Vec<AaTransaction> {
        self.txs_for(paymaster)
    }

    fn txs_for(&self, address: Address) -> Vec<AaTransaction> {
        if address.is_zero() {
            return Vec::new();
        }
        self.inner.read().by_entity(address)
    }

    /// FIFO snapshot of the whole pool
    pub fn dump(&self) -> Vec<AaTransaction> {
        self.inner.read().dump()
    }

    /// Number of pending transactions
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, persisted and in-memory
    pub fn clear(&self) -> MempoolResult<()> {
        let prefix = format!("{MEMPOOL_PREFIX}{SEPARATOR}");
        let entries = self
            .store
            .prefix_scan(prefix.as_bytes())
            .context("should scan mempool entries")?;
        self.store
            .update(|txn| {
                for (key, _) in &entries {
                    txn.delete(key)?;
                }
                Ok(())
            })
            .context("should clear mempool entries")?;
        self.inner.write().clear();
        self.record_size();
        Ok(())
    }

    fn record_size(&self) {
        metrics::gauge!("wharf_mempool_size").set(self.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, U256};

    use super::*;

    fn open_pool() -> (tempfile::TempDir, Mempool) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        (dir, Mempool::new(store).unwrap())
    }

    fn mock_tx() -> AaTransaction {
        AaTransaction {
            sender: address!("aed1a2c7b2ae5e1541b6b1d0f4f6c71bd21b2a3f"),
            big_nonce: U256::from(1u128 << 64),
            max_fee_per_gas: U256::from(2),
            max_priority_fee_per_gas: U256::from(1),
            ..Default::default()
        }
    }

    #[test]
    fn add_dump_remove() {
        let (dir, pool) = open_pool();
        let tx = mock_tx();

        pool.add(tx.clone()).unwrap();
        assert_eq!(pool.dump(), vec![tx.clone()]);

        pool.remove(&[tx]).unwrap();
        assert!(pool.dump().is_empty());

        // a fresh pool over the same store is also empty
        drop(pool);
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let reloaded = Mempool::new(store).unwrap();
        assert!(reloaded.dump().is_empty());
    }

    #[test]
    fn replacement_keeps_rank() {
        let (_dir, pool) = open_pool();
        let tx_a = mock_tx();

        let mut tx_b = tx_a.clone();
        tx_b.max_fee_per_gas = U256::from(3);
        tx_b.max_priority_fee_per_gas = U256::from(2);

        let mut tx_c = mock_tx();
        tx_c.sender = address!("1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d");

        pool.add(tx_a).unwrap();
        pool.add(tx_c.clone()).unwrap();
        pool.add(tx_b.clone()).unwrap();

        assert_eq!(pool.dump(), vec![tx_b, tx_c]);
    }

    #[test]
    fn dump_is_fifo() {
        let (_dir, pool) = open_pool();
        let mut txs = Vec::new();
        for i in 0..3u64 {
            let mut tx = mock_tx();
            tx.sender = Address::random();
            tx.big_nonce = U256::from(i);
            pool.add(tx.clone()).unwrap();
            txs.push(tx);
        }
        assert_eq!(pool.dump(), txs);
    }

    #[test]
    fn persisted_entries_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let pool = Mempool::new(store).unwrap();

        // a single sender with ascending nonces: arrival order matches the
        // store's key order, so the reloaded dump is identical
        let sender = address!("aed1a2c7b2ae5e1541b6b1d0f4f6c71bd21b2a3f");
        let mut txs = Vec::new();
        for nonce in 1..4u64 {
            let mut tx = mock_tx();
            tx.sender = sender;
            tx.nonce = nonce;
            tx.big_nonce = U256::from(nonce);
            pool.add(tx.clone()).unwrap();
            txs.push(tx);
        }
        pool.remove(&[txs.remove(1)]).unwrap();
        let before = pool.dump();
        drop(pool);

        let store = Arc::new(Store::open(dir.path()).unwrap());
        let reloaded = Mempool::new(store).unwrap();
        assert_eq!(reloaded.dump(), before);
    }

    #[test]
    fn entity_lookups() {
        let (_dir, pool) = open_pool();
        let paymaster = Address::random();

        let mut tx = mock_tx();
        tx.paymaster = Some(paymaster);
        pool.add(tx.clone()).unwrap();

        assert_eq!(pool.by_sender(tx.sender), vec![tx.clone()]);
        assert_eq!(pool.by_paymaster(paymaster), vec![tx.clone()]);
        assert!(pool.by_deployer(Address::random()).is_empty());
        // the zero address indexes nothing
        assert!(pool.by_sender(Address::ZERO).is_empty());
    }

    #[test]
    fn clear_drops_persisted_state() {
        let (dir, pool) = open_pool();
        pool.add(mock_tx()).unwrap();
        pool.clear().unwrap();
        assert!(pool.is_empty());

        drop(pool);
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let reloaded = Mempool::new(store).unwrap();
        assert!(reloaded.is_empty());
    }
}
