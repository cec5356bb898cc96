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

use std::collections::{BTreeMap, BTreeSet, HashMap};

use alloy_primitives::{Address, U256};
use wharf_types::{AaTransaction, TxId};

/// In-memory multi-index over the pooled transactions.
///
/// Every transaction is stored once, keyed by `(sender, bigNonce)`. The
/// global index preserves FIFO through a monotonically increasing rank
/// stamped on first insert; a replacement inherits the replaced entry's
/// rank. Per-entity indices order a sender's entries by `bigNonce` and a
/// deployer's or paymaster's entries by a local arrival counter.
#[derive(Debug, Default)]
pub(crate) struct PoolInner {
    by_id: HashMap<TxId, PooledTx>,
    global: BTreeMap<u64, TxId>,
    by_entity: HashMap<Address, BTreeSet<(U256, TxId)>>,
    arrival_by_entity: HashMap<Address, u64>,
    submission_id: u64,
}

#[derive(Debug, Clone)]
struct PooledTx {
    tx: AaTransaction,
    rank: u64,
    entity_scores: Vec<(Address, U256)>,
}

impl PoolInner {
    /// Upsert on `(sender, bigNonce)`. A replacement keeps the replaced
    /// entry's global rank so FIFO is not reshuffled.
    pub(crate) fn add(&mut self, tx: AaTransaction) {
        let id = tx.id();
        let rank = match self.by_id.get(&id).map(|pooled| pooled.rank) {
            Some(rank) => {
                // replacement: drop the old entry but keep its rank
                self.remove(&id);
                rank
            }
            None => {
                let rank = self.submission_id;
                self.submission_id += 1;
                rank
            }
        };

        let mut entity_scores = vec![(tx.sender, tx.big_nonce)];
        for address in [tx.deployer, tx.paymaster].into_iter().flatten() {
            let counter = self.arrival_by_entity.entry(address).or_insert(0);
            entity_scores.push((address, U256::from(*counter)));
            *counter += 1;
        }

        for (address, score) in &entity_scores {
            self.by_entity
                .entry(*address)
                .or_default()
                .insert((*score, id));
        }
        self.global.insert(rank, id);
        self.by_id.insert(
            id,
            PooledTx {
                tx,
                rank,
                entity_scores,
            },
        );
    }

    /// Remove the entry with the given id from every index
    pub(crate) fn remove(&mut self, id: &TxId) -> Option<AaTransaction> {
        let pooled = self.by_id.remove(id)?;
        self.global.remove(&pooled.rank);
        for (address, score) in &pooled.entity_scores {
            if let Some(index) = self.by_entity.get_mut(address) {
                index.remove(&(*score, *id));
                if index.is_empty() {
                    self.by_entity.remove(address);
                }
            }
        }
        Some(pooled.tx)
    }

    /// All entries referencing the given address, in index score order
    pub(crate) fn by_entity(&self, address: Address) -> Vec<AaTransaction> {
        let Some(index) = self.by_entity.get(&address) else {
            return Vec::new();
        };
        index
            .iter()
            .filter_map(|(_, id)| self.by_id.get(id))
            .map(|pooled| pooled.tx.clone())
            .collect()
    }

    /// FIFO snapshot of the whole pool
    pub(crate) fn dump(&self) -> Vec<AaTransaction> {
        self.global
            .values()
            .filter_map(|id| self.by_id.get(id))
            .map(|pooled| pooled.tx.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_id.clear();
        self.global.clear();
        self.by_entity.clear();
        self.arrival_by_entity.clear();
        self.submission_id = 0;
    }
}
