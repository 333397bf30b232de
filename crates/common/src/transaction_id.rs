//! Transaction identifier allocated by the coordinator
//!
//! Ids come from a single monotonically increasing source, so numeric
//! order is also start order.

use crate::error::{IdError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinator-assigned transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Parse from the decimal wire representation, ignoring surrounding whitespace
    pub fn parse(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| IdError::InvalidTransactionId(s.to_string()))
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TxnId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<u64> for TxnId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
