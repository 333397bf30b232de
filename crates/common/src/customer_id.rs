//! Customer identifiers and the record key they map to

use crate::error::{IdError, Result};
use crate::shard_kind::ShardKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric customer id, unique within the customer shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(u64);

impl CustomerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Record key on the customer shard, e.g. `customer-7`
    pub fn key(&self) -> String {
        format!("{}-{}", ShardKind::Customer.key_prefix(), self.0)
    }

    /// Parse a full record key such as `customer-7`
    pub fn from_key(key: &str) -> Result<Self> {
        let normalized = key.trim().to_lowercase();
        normalized
            .strip_prefix("customer-")
            .ok_or_else(|| IdError::InvalidCustomerId(key.to_string()))
            .and_then(Self::parse)
    }

    pub fn parse(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| IdError::InvalidCustomerId(s.to_string()))
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CustomerId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
