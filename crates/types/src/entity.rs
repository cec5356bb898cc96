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

use std::str::FromStr;

use alloy_primitives::Address;
use anyhow::bail;
use parse_display::Display;
use serde::{Deserialize, Serialize};

/// The role an address plays on a RIP-7560 transaction
#[derive(Display, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// The sender account
    Account,
    /// The factory deploying the sender account
    Deployer,
    /// The paymaster covering gas
    Paymaster,
}

impl EntityType {
    /// Get the string representation of the entity type
    pub fn to_str(&self) -> &'static str {
        match self {
            EntityType::Account => "account",
            EntityType::Deployer => "deployer",
            EntityType::Paymaster => "paymaster",
        }
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(EntityType::Account),
            "deployer" => Ok(EntityType::Deployer),
            "paymaster" => Ok(EntityType::Paymaster),
            _ => bail!("Invalid entity type: {s}"),
        }
    }
}

/// An entity of a RIP-7560 transaction
#[derive(Display, Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[display("{kind} {address}")]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// The type of entity
    pub kind: EntityType,
    /// The address of the entity
    pub address: Address,
}

impl Entity {
    /// Create a new entity of the given kind and address
    pub fn new(kind: EntityType, address: Address) -> Self {
        Self { kind, address }
    }

    /// Create a new account entity
    pub fn account(address: Address) -> Self {
        Self::new(EntityType::Account, address)
    }

    /// Create a new deployer entity
    pub fn deployer(address: Address) -> Self {
        Self::new(EntityType::Deployer, address)
    }

    /// Create a new paymaster entity
    pub fn paymaster(address: Address) -> Self {
        Self::new(EntityType::Paymaster, address)
    }
}

/// How a storage slot was touched during validation tracing
#[derive(Display, Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[display(style = "lowercase")]
pub enum AccessMode {
    /// The slot was read
    Read,
    /// The slot was written
    Write,
}
