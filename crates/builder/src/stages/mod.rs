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

//! The batch stages of the bundling pipeline.

mod cleanup;
pub use cleanup::Cleanup;

mod code_hashes;
pub use code_hashes::CheckCodeHashes;

mod expire;
pub use expire::DropExpired;

mod gas_limit;
pub use gas_limit::MaintainGasLimit;

mod gas_price;
pub use gas_price::{FilterUnderpriced, SortByGasPrice};

mod nonce;
pub use nonce::SortByNonce;

mod reputation;
pub use reputation::IncIncluded;
