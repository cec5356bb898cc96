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

//! Validation simulation and gas-market estimation against the execution
//! layer.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod fees;
pub use fees::FeeOracle;

mod simulation;
#[cfg(any(test, feature = "test-utils"))]
pub use simulation::MockSimulator;
pub use simulation::{
    SimulationSummary, Simulator, SimulatorImpl, BANNED_OPCODES, BANNED_UNSTAKED_OPCODES,
    DEADLINE_SLACK_SECS,
};
