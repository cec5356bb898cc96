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

use alloy_primitives::Address;
use async_trait::async_trait;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use wharf_pool::{Mempool, ReputationTracker};
use wharf_types::{AaTransaction, Reputation};

use crate::error::{internal_err, mempool_err, DEBUG_DISABLED};

/// The `debug` namespace used by the test suites. Every method fails unless
/// debug mode is configured.
#[rpc(server, namespace = "debug")]
pub trait DebugApi {
    /// Clear the mempool and all reputation records
    #[method(name = "bundler_clearState")]
    async fn bundler_clear_state(&self) -> RpcResult<String>;

    /// Dump the mempool in arrival order
    #[method(name = "bundler_dumpMempool")]
    async fn bundler_dump_mempool(&self) -> RpcResult<Vec<AaTransaction>>;

    /// Overwrite the reputation of the given addresses
    #[method(name = "bundler_setReputation")]
    async fn bundler_set_reputation(
        &self,
        reputations: Vec<Reputation>,
        entry_point: Address,
    ) -> RpcResult<String>;

    /// Dump all tracked reputation records
    #[method(name = "bundler_dumpReputation")]
    async fn bundler_dump_reputation(&self, entry_point: Address) -> RpcResult<Vec<Reputation>>;
}

/// `debug` namespace handler
pub struct DebugApi {
    enabled: bool,
    mempool: Arc<Mempool>,
    reputation: Arc<ReputationTracker>,
}

impl DebugApi {
    /// Create the handler; when `enabled` is false every method returns the
    /// debug-disabled error
    pub fn new(enabled: bool, mempool: Arc<Mempool>, reputation: Arc<ReputationTracker>) -> Self {
        Self {
            enabled,
            mempool,
            reputation,
        }
    }

    fn check_enabled(&self) -> RpcResult<()> {
        if !self.enabled {
            return Err(internal_err(DEBUG_DISABLED));
        }
        Ok(())
    }
}

#[async_trait]
impl DebugApiServer for DebugApi {
    async fn bundler_clear_state(&self) -> RpcResult<String> {
        self.check_enabled()?;
        self.mempool.clear().map_err(mempool_err)?;
        self.reputation.clear().map_err(mempool_err)?;
        Ok("ok".to_string())
    }

    async fn bundler_dump_mempool(&self) -> RpcResult<Vec<AaTransaction>> {
        self.check_enabled()?;
        Ok(self.mempool.dump())
    }

    async fn bundler_set_reputation(
        &self,
        reputations: Vec<Reputation>,
        _entry_point: Address,
    ) -> RpcResult<String> {
        self.check_enabled()?;
        self.reputation
            .set_overrides(&reputations)
            .map_err(mempool_err)?;
        Ok("ok".to_string())
    }

    async fn bundler_dump_reputation(&self, _entry_point: Address) -> RpcResult<Vec<Reputation>> {
        self.check_enabled()?;
        self.reputation.dump().map_err(mempool_err)
    }
}

#[cfg(test)]
mod tests {
    use wharf_store::Store;
    use wharf_types::ReputationConstants;

    use super::*;

    fn debug_api(enabled: bool) -> (tempfile::TempDir, DebugApi) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let mempool = Arc::new(Mempool::new(store.clone()).unwrap());
        let reputation = Arc::new(ReputationTracker::new(
            store,
            ReputationConstants::default(),
        ));
        (dir, DebugApi::new(enabled, mempool, reputation))
    }

    #[tokio::test]
    async fn disabled_debug_mode_rejects_every_method() {
        let (_dir, api) = debug_api(false);
        let err = api.bundler_dump_mempool().await.unwrap_err();
        assert!(err.message().contains("rpc: debug mode is not enabled"));
    }

    #[tokio::test]
    async fn set_and_dump_reputation() {
        let (_dir, api) = debug_api(true);
        let record = Reputation {
            address: Address::random(),
            txs_seen: 10,
            txs_included: 1,
        };
        api.bundler_set_reputation(vec![record], Address::ZERO)
            .await
            .unwrap();

        let dump = api.bundler_dump_reputation(Address::ZERO).await.unwrap();
        assert_eq!(dump, vec![record]);

        api.bundler_clear_state().await.unwrap();
        assert!(api
            .bundler_dump_reputation(Address::ZERO)
            .await
            .unwrap()
            .is_empty());
    }
}
