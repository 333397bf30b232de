//! Per-transaction staging area
//!
//! Writes are staged here and only installed into the committed map at
//! commit. A `None` value is a staged tombstone.

use super::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shard-local phase of a live transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnPhase {
    /// Holding locks and possibly staged writes
    Active,
    /// Voted yes; frozen until the decision arrives
    Prepared,
}

/// Transaction execution state on one shard
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub phase: TxnPhase,
    writes: BTreeMap<String, Option<Record>>,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self {
            phase: TxnPhase::Active,
            writes: BTreeMap::new(),
        }
    }

    /// Staged value for a key; `Some(None)` means staged deletion
    pub fn staged(&self, key: &str) -> Option<&Option<Record>> {
        self.writes.get(key)
    }

    pub fn stage(&mut self, key: String, value: Option<Record>) {
        self.writes.insert(key, value);
    }

    pub fn writes(&self) -> impl Iterator<Item = (&String, &Option<Record>)> {
        self.writes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> BTreeMap<String, Option<Record>> {
        self.writes
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}
