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

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::transaction::AaTransaction;

/// Arguments of an `aa_getRip7560Bundle` request from a block builder
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetRip7560BundleArgs {
    /// Base fee the builder expects for the target block
    pub min_base_fee: U256,
    /// Gas cap of the produced bundle
    #[serde(with = "alloy_serde::quantity")]
    pub max_bundle_gas: u64,
    /// Maximum number of transactions in the produced bundle, 0 = unbounded
    #[serde(with = "alloy_serde::quantity")]
    pub max_bundle_size: u64,
}

/// A bundle of AA transactions handed to a block builder
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRip7560BundleResult {
    /// The ordered transactions of the bundle
    pub bundle: Vec<AaTransaction>,
    /// Highest block number this bundle remains valid for
    pub valid_for_block: U256,
}
