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

//! Embedded transactional KV store used by the mempool, the reputation
//! tracker, and the code-hash cache.
//!
//! Keys are flat byte strings namespaced by `:`-joined segments, e.g.
//! `mempool:<sender>:<nonce>:<bigNonce>`. The store exposes plain point
//! reads/writes, ordered prefix iteration, and closure-scoped transactions
//! with read-your-write semantics.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod db;
pub use db::{Store, StoreTxn};

mod keys;
pub use keys::{join_values, split_values, SEPARATOR};

/// Error produced by the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),
    /// A persisted value failed to decode
    #[error("corrupted value at key {0}")]
    Corrupted(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
