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

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Bytecode hash of one contract touched during validation tracing.
///
/// The full snapshot of a transaction is the list of these captured at
/// admission time; bundling recomputes the hashes to detect contracts whose
/// code changed after simulation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCodeHash {
    /// The touched contract
    pub address: Address,
    /// keccak256 of its deployed bytecode at capture time
    pub code_hash: B256,
}
