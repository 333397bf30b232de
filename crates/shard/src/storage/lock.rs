//! Lock manager for shard storage
//!
//! Provides key-level locking with shared/exclusive modes under a no-wait
//! policy: a conflicting request is refused immediately instead of queued,
//! and locks are only ever released all at once when the transaction ends.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use travel_common::TxnId;

/// Lock modes for shard operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    /// Shared lock for reading
    Shared,
    /// Exclusive lock for writing
    Exclusive,
}

impl LockMode {
    /// Check if two lock modes are compatible
    pub fn is_compatible_with(&self, other: LockMode) -> bool {
        matches!((*self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Whether holding `self` already satisfies a request for `other`
    pub fn covers(&self, other: LockMode) -> bool {
        *self == LockMode::Exclusive || other == LockMode::Shared
    }
}

/// Information about a held lock
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub holder: TxnId,
    pub mode: LockMode,
}

/// Result of a lock request
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    /// Lock is now held (newly granted, re-granted or upgraded)
    Granted,
    /// Lock conflicts with existing locks
    Blocked {
        /// All transactions holding conflicting locks (oldest first)
        holders: Vec<(TxnId, LockMode)>,
    },
    /// Granting would close a cycle; reserved for local cycle detection
    Deadlock,
}

impl LockOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockOutcome::Granted)
    }
}

/// Lock manager for key-level locking
#[derive(Debug, Default)]
pub struct LockManager {
    /// All currently held locks (key -> lock holders)
    locks: HashMap<String, Vec<LockInfo>>,

    /// Reverse index (transaction -> keys it holds)
    held: HashMap<TxnId, BTreeSet<String>>,
}

impl LockManager {
    /// Create a new lock manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a lock, granting it if compatible with every other holder.
    ///
    /// A transaction that already holds the key is re-granted when its mode
    /// covers the request, and upgraded from shared to exclusive only when it
    /// is the sole holder.
    pub fn acquire(&mut self, tx_id: TxnId, key: &str, mode: LockMode) -> LockOutcome {
        let holders = self.locks.entry(key.to_string()).or_default();

        let mut conflicts: Vec<(TxnId, LockMode)> = holders
            .iter()
            .filter(|h| h.holder != tx_id && !h.mode.is_compatible_with(mode))
            .map(|h| (h.holder, h.mode))
            .collect();

        if !conflicts.is_empty() {
            conflicts.sort_by_key(|(txn, _)| *txn);
            return LockOutcome::Blocked { holders: conflicts };
        }

        match holders.iter_mut().find(|h| h.holder == tx_id) {
            Some(own) if own.mode.covers(mode) => {}
            // Upgrade; no other holder exists or the conflict check would have failed
            Some(own) => own.mode = mode,
            None => holders.push(LockInfo {
                holder: tx_id,
                mode,
            }),
        }

        self.held.entry(tx_id).or_default().insert(key.to_string());
        LockOutcome::Granted
    }

    /// Release all locks held by a transaction
    pub fn release_all(&mut self, tx_id: TxnId) {
        let Some(keys) = self.held.remove(&tx_id) else {
            return;
        };

        for key in keys {
            if let Some(holders) = self.locks.get_mut(&key) {
                holders.retain(|lock| lock.holder != tx_id);
                if holders.is_empty() {
                    self.locks.remove(&key);
                }
            }
        }
    }

    /// Get all locks held by a transaction, sorted by key
    pub fn locks_held_by(&self, tx_id: TxnId) -> Vec<(String, LockMode)> {
        let Some(keys) = self.held.get(&tx_id) else {
            return Vec::new();
        };

        keys.iter()
            .filter_map(|key| {
                self.locks
                    .get(key)?
                    .iter()
                    .find(|h| h.holder == tx_id)
                    .map(|h| (key.clone(), h.mode))
            })
            .collect()
    }

    /// Check if a transaction holds any locks
    pub fn has_locks(&self, tx_id: TxnId) -> bool {
        self.held.get(&tx_id).is_some_and(|keys| !keys.is_empty())
    }

    /// Current holders of a key
    pub fn holders(&self, key: &str) -> Vec<(TxnId, LockMode)> {
        self.locks
            .get(key)
            .map(|holders| holders.iter().map(|h| (h.holder, h.mode)).collect())
            .unwrap_or_default()
    }

    /// Number of keys with at least one holder
    pub fn locked_key_count(&self) -> usize {
        self.locks.len()
    }
}
