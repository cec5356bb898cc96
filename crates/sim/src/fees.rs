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

use alloy_primitives::U256;
use wharf_provider::EvmProvider;
use wharf_types::{FeeSnapshot, GasPrices};

/// Gas-market oracle over the execution layer. Bundling runs take a single
/// snapshot from it; estimation uses it to fill in unset fees.
#[derive(Debug)]
pub struct FeeOracle<E> {
    provider: Arc<E>,
}

impl<E> Clone for FeeOracle<E> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<E: EvmProvider> FeeOracle<E> {
    /// Create an oracle over the given provider
    pub fn new(provider: Arc<E>) -> Self {
        Self { provider }
    }

    /// Observe the current gas market. The tip is only fetched on networks
    /// reporting a base fee; the legacy gas price is always fetched as the
    /// fallback for pre-EIP-1559 networks.
    pub async fn fee_snapshot(&self) -> anyhow::Result<FeeSnapshot> {
        let base_fee = self.provider.base_fee().await?;
        let tip = match base_fee {
            Some(_) => Some(self.provider.max_priority_fee().await?),
            None => None,
        };
        let gas_price = self.provider.gas_price().await?;
        Ok(FeeSnapshot {
            base_fee,
            tip,
            gas_price: Some(gas_price),
        })
    }

    /// Suggested fee values for transactions submitted without fees set.
    /// The cap leaves headroom for one doubling of the base fee.
    pub async fn gas_prices(&self) -> anyhow::Result<GasPrices> {
        let snapshot = self.fee_snapshot().await?;
        match (snapshot.base_fee, snapshot.tip) {
            (Some(base_fee), Some(tip)) => Ok(GasPrices {
                max_fee_per_gas: base_fee * U256::from(2) + tip,
                max_priority_fee_per_gas: tip,
            }),
            _ => {
                let gas_price = snapshot.gas_price.unwrap_or_default();
                Ok(GasPrices {
                    max_fee_per_gas: gas_price,
                    max_priority_fee_per_gas: gas_price,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wharf_provider::MockEvmProvider;

    use super::*;

    #[tokio::test]
    async fn snapshot_skips_tip_without_base_fee() {
        let mut provider = MockEvmProvider::new();
        provider.expect_base_fee().returning(|| Ok(None));
        provider
            .expect_gas_price()
            .returning(|| Ok(U256::from(7)));

        let oracle = FeeOracle::new(Arc::new(provider));
        let snapshot = oracle.fee_snapshot().await.unwrap();
        assert_eq!(snapshot.base_fee, None);
        assert_eq!(snapshot.tip, None);
        assert_eq!(snapshot.gas_price, Some(U256::from(7)));
        assert!(!snapshot.is_dynamic());
    }

    #[tokio::test]
    async fn gas_prices_leave_base_fee_headroom() {
        let mut provider = MockEvmProvider::new();
        provider
            .expect_base_fee()
            .returning(|| Ok(Some(U256::from(100))));
        provider
            .expect_max_priority_fee()
            .returning(|| Ok(U256::from(3)));
        provider
            .expect_gas_price()
            .returning(|| Ok(U256::from(103)));

        let oracle = FeeOracle::new(Arc::new(provider));
        let prices = oracle.gas_prices().await.unwrap();
        assert_eq!(prices.max_fee_per_gas, U256::from(203));
        assert_eq!(prices.max_priority_fee_per_gas, U256::from(3));
    }
}
