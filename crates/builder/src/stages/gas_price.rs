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

use async_trait::async_trait;
use wharf_types::{BatchContext, BatchStage, MempoolResult};

/// Orders the batch by effective gas price, highest first. Stable, so
/// equal-priced entries keep their FIFO order.
pub struct SortByGasPrice;

#[async_trait]
impl BatchStage for SortByGasPrice {
    fn name(&self) -> &'static str {
        "gasprice.sort"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        match ctx.fees.base_fee.filter(|base_fee| !base_fee.is_zero()) {
            Some(base_fee) => ctx.batch.sort_by(|a, b| {
                b.dynamic_gas_price(base_fee)
                    .cmp(&a.dynamic_gas_price(base_fee))
            }),
            None => ctx
                .batch
                .sort_by(|a, b| b.max_fee_per_gas.cmp(&a.max_fee_per_gas)),
        }
        Ok(())
    }
}

/// Drops entries that would not pay the expected bundle gas price. Filtered
/// entries are not marked for eviction; they stay in the pool for a later
/// run.
pub struct FilterUnderpriced;

#[async_trait]
impl BatchStage for FilterUnderpriced {
    fn name(&self) -> &'static str {
        "gasprice.filterUnderpriced"
    }

    async fn run(&self, ctx: &mut BatchContext) -> MempoolResult<()> {
        if ctx.fees.is_dynamic() {
            let base_fee = ctx.fees.base_fee.expect("dynamic snapshot has a base fee");
            let tip = ctx.fees.tip.expect("dynamic snapshot has a tip");
            let expected = base_fee + tip;
            ctx.batch
                .retain(|tx| tx.dynamic_gas_price(base_fee) >= expected);
        } else if let Some(gas_price) = ctx.fees.gas_price {
            ctx.batch.retain(|tx| tx.max_fee_per_gas >= gas_price);
        }
        Ok(())
    }
}
