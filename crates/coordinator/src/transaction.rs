//! Coordinator-side transaction bookkeeping
//!
//! The manager hands out transaction ids and remembers, per transaction,
//! its status and the shards that took part in it. Terminal statuses are
//! sticky: a second commit or abort of the same tid is refused. Once the
//! decision has been broadcast the participant set is dropped.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use travel_common::{ShardKind, TxnId};

/// Transaction status in the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Started and not yet decided
    Active,
    Committed,
    Aborted,
    /// Never started by this coordinator
    Unknown,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::Aborted
        )
    }
}

#[derive(Debug)]
struct TransactionEntry {
    status: TransactionStatus,
    participants: BTreeSet<ShardKind>,
}

/// Allocates tids and tracks status and participants
#[derive(Debug)]
pub struct TransactionManager {
    next_tid: AtomicU64,
    transactions: Mutex<HashMap<TxnId, TransactionEntry>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_tid: AtomicU64::new(1),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new transaction
    pub fn begin(&self) -> TxnId {
        let tid = TxnId::new(self.next_tid.fetch_add(1, Ordering::SeqCst));
        self.transactions.lock().insert(
            tid,
            TransactionEntry {
                status: TransactionStatus::Active,
                participants: BTreeSet::new(),
            },
        );
        debug!(%tid, "Transaction started");
        tid
    }

    /// Record that `shard` holds state for `tid`. Ignored once `tid` has ended.
    pub fn add_participant(&self, tid: TxnId, shard: ShardKind) {
        if let Some(entry) = self.transactions.lock().get_mut(&tid)
            && entry.status == TransactionStatus::Active
        {
            entry.participants.insert(shard);
        }
    }

    /// Participants of `tid` in a stable order
    pub fn participants(&self, tid: TxnId) -> Vec<ShardKind> {
        self.transactions
            .lock()
            .get(&tid)
            .map(|entry| entry.participants.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn status(&self, tid: TxnId) -> TransactionStatus {
        self.transactions
            .lock()
            .get(&tid)
            .map(|entry| entry.status)
            .unwrap_or(TransactionStatus::Unknown)
    }

    /// Mark `tid` committed. Returns false if it was unknown or already ended.
    pub fn commit(&self, tid: TxnId) -> bool {
        self.finish(tid, TransactionStatus::Committed)
    }

    /// Mark `tid` aborted. Returns false if it was unknown or already ended.
    pub fn abort(&self, tid: TxnId) -> bool {
        self.finish(tid, TransactionStatus::Aborted)
    }

    /// Drop the participant set of an ended transaction; only its status is kept
    pub fn retire(&self, tid: TxnId) {
        if let Some(entry) = self.transactions.lock().get_mut(&tid)
            && entry.status.is_terminal()
        {
            entry.participants.clear();
        }
    }

    fn finish(&self, tid: TxnId, status: TransactionStatus) -> bool {
        let mut transactions = self.transactions.lock();
        match transactions.get_mut(&tid) {
            Some(entry) if entry.status == TransactionStatus::Active => {
                entry.status = status;
                true
            }
            _ => false,
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
