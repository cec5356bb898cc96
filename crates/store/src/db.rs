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

use std::path::Path;

use rocksdb::{
    Direction, IteratorMode, Options, Transaction, TransactionDB, TransactionDBOptions,
};

use crate::StoreResult;

/// Handle to the embedded transactional database. Cheap to share behind an
/// `Arc`; all methods take `&self`.
pub struct Store {
    db: TransactionDB,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let txn_opts = TransactionDBOptions::default();
        let db = TransactionDB::open(&opts, &txn_opts, path)?;
        Ok(Self { db })
    }

    /// Point read
    pub fn get(&self, key: impl AsRef<[u8]>) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    /// Point write
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> StoreResult<()> {
        Ok(self.db.put(key, value)?)
    }

    /// Point delete
    pub fn delete(&self, key: impl AsRef<[u8]>) -> StoreResult<()> {
        Ok(self.db.delete(key)?)
    }

    /// All entries whose key starts with `prefix`, in key order
    pub fn prefix_scan(&self, prefix: impl AsRef<[u8]>) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.as_ref();
        let mut entries = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.into_vec(), value.into_vec()));
        }
        Ok(entries)
    }

    /// Run `f` inside a transaction with read-your-write semantics. The
    /// transaction commits when `f` returns `Ok` and rolls back otherwise.
    pub fn update<T>(&self, f: impl FnOnce(&StoreTxn<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let txn = StoreTxn {
            inner: self.db.transaction(),
        };
        match f(&txn) {
            Ok(value) => {
                txn.inner.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = txn.inner.rollback();
                Err(err)
            }
        }
    }

}

/// A transaction scoped to one [`Store::update`] call
pub struct StoreTxn<'db> {
    inner: Transaction<'db, TransactionDB>,
}

impl StoreTxn<'_> {
    /// Point read, observing earlier writes of this transaction
    pub fn get(&self, key: impl AsRef<[u8]>) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.get(key)?)
    }

    /// Point write
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> StoreResult<()> {
        Ok(self.inner.put(key, value)?)
    }

    /// Point delete
    pub fn delete(&self, key: impl AsRef<[u8]>) -> StoreResult<()> {
        Ok(self.inner.delete(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn point_ops() {
        let (_dir, store) = open_temp();
        assert_eq!(store.get(b"a").unwrap(), None);

        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn prefix_scan_is_ordered_and_bounded() {
        let (_dir, store) = open_temp();
        store.put(b"mempool:b", b"2").unwrap();
        store.put(b"mempool:a", b"1").unwrap();
        store.put(b"other:z", b"3").unwrap();

        let entries = store.prefix_scan(b"mempool:").unwrap();
        assert_eq!(
            entries,
            vec![
                (b"mempool:a".to_vec(), b"1".to_vec()),
                (b"mempool:b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn update_commits_and_reads_its_writes() {
        let (_dir, store) = open_temp();
        store
            .update(|txn| {
                txn.put(b"k", b"v")?;
                assert_eq!(txn.get(b"k")?, Some(b"v".to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn update_rolls_back_on_error() {
        let (_dir, store) = open_temp();
        let result: StoreResult<()> = store.update(|txn| {
            txn.put(b"k", b"v")?;
            Err(StoreError::Corrupted("k".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(b"k").unwrap(), None);
    }
}
