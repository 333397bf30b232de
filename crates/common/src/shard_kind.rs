//! Shard and reservable item discriminators

use crate::error::IdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four resource shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShardKind {
    Flight,
    Car,
    Room,
    Customer,
}

impl ShardKind {
    pub const ALL: [ShardKind; 4] = [
        ShardKind::Flight,
        ShardKind::Car,
        ShardKind::Room,
        ShardKind::Customer,
    ];

    /// Lowercase prefix every key owned by this shard carries
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ShardKind::Flight => "flight",
            ShardKind::Car => "car",
            ShardKind::Room => "room",
            ShardKind::Customer => "customer",
        }
    }

    /// Port the shard listens on unless configured otherwise
    pub fn default_port(&self) -> u16 {
        match self {
            ShardKind::Flight => 5001,
            ShardKind::Car => 5002,
            ShardKind::Room => 5003,
            ShardKind::Customer => 5004,
        }
    }

    /// Inventory kind held by this shard, `None` for the customer shard
    pub fn item_kind(&self) -> Option<ItemKind> {
        match self {
            ShardKind::Flight => Some(ItemKind::Flight),
            ShardKind::Car => Some(ItemKind::Car),
            ShardKind::Room => Some(ItemKind::Room),
            ShardKind::Customer => None,
        }
    }

    /// Shard owning a normalised key, judged by its prefix
    pub fn owning(key: &str) -> Option<ShardKind> {
        let (prefix, _) = crate::key::split_key(key)?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.key_prefix() == prefix)
    }
}

impl fmt::Display for ShardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShardKind::Flight => "FlightRM",
            ShardKind::Car => "CarRM",
            ShardKind::Room => "RoomRM",
            ShardKind::Customer => "CustomerRM",
        };
        f.write_str(name)
    }
}

impl FromStr for ShardKind {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flight" | "flights" | "flightrm" => Ok(ShardKind::Flight),
            "car" | "cars" | "carrm" => Ok(ShardKind::Car),
            "room" | "rooms" | "roomrm" => Ok(ShardKind::Room),
            "customer" | "customers" | "customerrm" => Ok(ShardKind::Customer),
            _ => Err(IdError::UnknownShardKind(s.to_string())),
        }
    }
}

/// Classes of reservable inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Flight,
    Car,
    Room,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Flight, ItemKind::Car, ItemKind::Room];

    pub fn shard(&self) -> ShardKind {
        match self {
            ItemKind::Flight => ShardKind::Flight,
            ItemKind::Car => ShardKind::Car,
            ItemKind::Room => ShardKind::Room,
        }
    }

    /// Capitalised label used in reply reasons, e.g. `FlightHasReservations`
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Flight => "Flight",
            ItemKind::Car => "Car",
            ItemKind::Room => "Room",
        }
    }

    /// Normalised key for an item suffix (flight number or location)
    pub fn key(&self, suffix: &str) -> String {
        crate::key::normalize_key(&format!("{}-{}", self.shard().key_prefix(), suffix.trim()))
    }

    /// Accept either a full key of this kind or a bare suffix, returning the full key.
    ///
    /// Returns `None` when the argument is a full key of some other kind.
    pub fn resolve_key(&self, raw: &str) -> Option<String> {
        let normalized = crate::key::normalize_key(raw);
        match ShardKind::owning(&normalized) {
            Some(owner) if owner == self.shard() => Some(normalized),
            Some(_) => None,
            None => Some(self.key(raw)),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
