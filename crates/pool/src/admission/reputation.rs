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

//! Reputation gating of incoming transactions.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use wharf_types::{
    AdmissionStage, Entity, EntityType, MempoolError, MempoolResult, ReputationStatus, TxContext,
};

use crate::reputation::ReputationTracker;

const ENTITY_KINDS: [EntityType; 3] = [
    EntityType::Account,
    EntityType::Deployer,
    EntityType::Paymaster,
];

/// Rejects transactions whose entities are banned, or throttled while at
/// their pending cap
pub struct CheckStatus {
    reputation: Arc<ReputationTracker>,
}

impl CheckStatus {
    /// Create the stage over the given tracker
    pub fn new(reputation: Arc<ReputationTracker>) -> Self {
        Self { reputation }
    }
}

#[async_trait]
impl AdmissionStage for CheckStatus {
    fn name(&self) -> &'static str {
        "reputation.checkStatus"
    }

    async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()> {
        let throttled_cap = self.reputation.constants().throttled_entity_mempool_count;
        for kind in ENTITY_KINDS {
            let Some(address) = ctx.tx.entity_address(kind) else {
                continue;
            };
            let entity = Entity::new(kind, address);
            match self.reputation.status(address)? {
                ReputationStatus::Banned => return Err(MempoolError::EntityBanned(entity)),
                ReputationStatus::Throttled
                    if ctx.pending_for(kind).len() as u64 == throttled_cap =>
                {
                    return Err(MempoolError::EntityThrottled(entity));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Rejects transactions whose unstaked entities are at their pending-count
/// caps
pub struct ValidateLimit {
    reputation: Arc<ReputationTracker>,
}

impl ValidateLimit {
    /// Create the stage over the given tracker
    pub fn new(reputation: Arc<ReputationTracker>) -> Self {
        Self { reputation }
    }
}

#[async_trait]
impl AdmissionStage for ValidateLimit {
    fn name(&self) -> &'static str {
        "reputation.validateLimit"
    }

    async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()> {
        let constants = self.reputation.constants();
        for kind in ENTITY_KINDS {
            let Some(address) = ctx.tx.entity_address(kind) else {
                continue;
            };
            let cap = match kind {
                EntityType::Account => constants.same_sender_mempool_count,
                EntityType::Deployer | EntityType::Paymaster => {
                    constants.same_unstaked_entity_mempool_count
                }
            };
            if ctx.pending_for(kind).len() as u64 == cap {
                return Err(MempoolError::PendingCountExceeded(
                    Entity::new(kind, address),
                    cap,
                ));
            }
        }
        Ok(())
    }
}

/// Increments the `seen` counter of every distinct entity on the admission.
/// Runs last so rejected transactions leave no trace.
pub struct IncSeen {
    reputation: Arc<ReputationTracker>,
}

impl IncSeen {
    /// Create the stage over the given tracker
    pub fn new(reputation: Arc<ReputationTracker>) -> Self {
        Self { reputation }
    }
}

#[async_trait]
impl AdmissionStage for IncSeen {
    fn name(&self) -> &'static str {
        "reputation.incSeen"
    }

    async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()> {
        let mut addresses: Vec<Address> = Vec::with_capacity(3);
        for entity in ctx.tx.entities() {
            if !addresses.contains(&entity.address) {
                addresses.push(entity.address);
            }
        }
        self.reputation.inc_seen(&addresses)
    }
}
