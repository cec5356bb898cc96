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
use wharf_sim::Simulator;
use wharf_types::{AdmissionStage, MempoolResult, TxContext};

use crate::code_hash::CodeHashCache;

/// Runs the execution-layer validation simulation and, on success, persists
/// the transaction's code-hash snapshot
pub struct Simulate<S> {
    simulator: Arc<S>,
    code_hashes: Arc<CodeHashCache>,
}

impl<S> Simulate<S> {
    /// Create the stage over the given simulator and snapshot cache
    pub fn new(simulator: Arc<S>, code_hashes: Arc<CodeHashCache>) -> Self {
        Self {
            simulator,
            code_hashes,
        }
    }
}

#[async_trait]
impl<S: Simulator> AdmissionStage for Simulate<S> {
    fn name(&self) -> &'static str {
        "simulate"
    }

    async fn run(&self, ctx: &mut TxContext) -> MempoolResult<()> {
        let summary = self.simulator.simulate_validation(&ctx.tx).await?;
        self.code_hashes
            .save(ctx.tx.tx_hash(), &summary.code_hashes)
    }
}
