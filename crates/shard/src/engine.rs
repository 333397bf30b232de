//! Transactional store for one shard
//!
//! Every operation runs under strict two-phase locking with a no-wait
//! policy. Reads go through the caller's workspace first, then the
//! committed map; writes are staged in the workspace and only become
//! visible when the transaction commits.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use travel_common::{ItemKind, ShardKind, TxnId};
use travel_protocol::{ItemVerb, Operation, Reply, ShardCommand, ShardRequest, TransactionPhase};

use crate::error::{Result, ShardError};
use crate::participant::TransactionParticipant;
use crate::storage::{
    LockManager, LockMode, LockOutcome, Record, ReservableItem, TransactionContext, TxnPhase,
};

/// Live transactions and the customer id allocator
#[derive(Debug, Default)]
pub(crate) struct TransactionTable {
    pub(crate) contexts: HashMap<TxnId, TransactionContext>,

    /// Last id handed out by `AddCustomer`; only ever grows
    pub(crate) last_customer_id: u64,
}

/// In-memory store for one class of record
pub struct ShardStore {
    kind: ShardKind,

    /// Lock manager for pessimistic concurrency control
    pub(crate) locks: Mutex<LockManager>,

    /// Committed records (key -> record)
    pub(crate) committed: RwLock<BTreeMap<String, Record>>,

    /// Always taken before `locks` and `committed`
    pub(crate) transactions: Mutex<TransactionTable>,
}

impl ShardStore {
    pub fn new(kind: ShardKind) -> Self {
        Self {
            kind,
            locks: Mutex::new(LockManager::new()),
            committed: RwLock::new(BTreeMap::new()),
            transactions: Mutex::new(TransactionTable::default()),
        }
    }

    pub fn kind(&self) -> ShardKind {
        self.kind
    }

    /// Handle one raw request line. Blank lines produce no reply.
    pub fn handle_line(&self, line: &str) -> Option<Reply> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let reply = match ShardRequest::parse(line) {
            Ok(request) => self.handle(&request),
            Err(e) => {
                debug!(shard = %self.kind, error = %e, line, "Rejected request");
                Reply::fail(e.reason())
            }
        };
        Some(reply)
    }

    /// Handle a parsed request
    pub fn handle(&self, request: &ShardRequest) -> Reply {
        let tid = request.tid;
        match &request.command {
            ShardCommand::Phase(phase) => {
                let result = match phase {
                    TransactionPhase::Prepare => self.prepare(tid),
                    TransactionPhase::Commit => self.commit(tid),
                    TransactionPhase::Abort => self.abort(tid),
                };
                match result {
                    Ok(()) => Reply::ok(),
                    Err(e) => {
                        warn!(shard = %self.kind, %tid, %phase, error = %e, "Phase failed");
                        Reply::fail(e.reason())
                    }
                }
            }
            ShardCommand::Operation(op) => match self.execute(tid, op) {
                Ok(value) => Reply::Ok(value),
                Err(e) => {
                    debug!(shard = %self.kind, %tid, %op, error = %e, "Operation failed");
                    Reply::fail(e.reason())
                }
            },
        }
    }

    /// Execute a data operation, returning the `OK` payload if any
    pub fn execute(&self, tid: TxnId, op: &Operation) -> Result<Option<String>> {
        debug!(shard = %self.kind, %tid, %op, "Executing operation");

        match op {
            Operation::AddItem {
                kind,
                id,
                count,
                price,
            } => self.add_item(tid, *kind, id, *count, *price).map(|()| None),
            Operation::DeleteItem { kind, id } => self.delete_item(tid, *kind, id).map(|()| None),
            Operation::QueryCount { kind, id } => {
                self.query_count(tid, *kind, id).map(|n| Some(n.to_string()))
            }
            Operation::QueryPrice { kind, id } => {
                self.query_price(tid, *kind, id).map(|p| Some(p.to_string()))
            }
            Operation::ItemExists { kind, id } => {
                self.item_exists(tid, *kind, id).map(|b| Some(b.to_string()))
            }
            Operation::Reserve { kind, customer, id } => {
                self.reserve_item(tid, *kind, *customer, id).map(|()| None)
            }
            Operation::QueryReserved { key } => {
                self.query_reserved(tid, key).map(|n| Some(n.to_string()))
            }
            Operation::RollbackReserve {
                customer,
                key,
                count,
            } => self
                .rollback_reserve(tid, *customer, key, *count)
                .map(|()| None),
            Operation::AddCustomer => self.new_customer(tid).map(|id| Some(id.to_string())),
            Operation::AddCustomerId { customer } => {
                self.new_customer_id(tid, *customer).map(|()| None)
            }
            Operation::DeleteCustomer { customer } => {
                self.delete_customer(tid, *customer).map(|()| None)
            }
            Operation::QueryCustomer { customer } => {
                self.query_customer_info(tid, *customer).map(Some)
            }
            Operation::CustomerExists { customer } => self
                .customer_exists(tid, *customer)
                .map(|b| Some(b.to_string())),
            Operation::CustomerReserve {
                customer,
                key,
                count,
                price,
            } => self
                .customer_reserve(tid, *customer, key, *count, *price)
                .map(|()| None),
            Operation::GetItem { key } => self.get_item(tid, key).map(Some),
            Operation::Bundle { .. } => Err(self.unsupported(op.command_name())),
        }
    }

    /// Shard-local phase of a transaction; `None` once it has ended
    pub fn phase(&self, tid: TxnId) -> Option<TxnPhase> {
        self.transactions.lock().contexts.get(&tid).map(|c| c.phase)
    }

    /// Number of transactions holding locks or staged writes here
    pub fn live_transactions(&self) -> usize {
        self.transactions.lock().contexts.len()
    }

    /// Committed value of a key
    pub fn committed_record(&self, key: &str) -> Option<Record> {
        self.committed.read().get(key).cloned()
    }

    /// Committed inventory record of an item
    pub fn committed_item(&self, kind: ItemKind, id: &str) -> Option<ReservableItem> {
        self.committed_record(&kind.key(id))
            .and_then(Record::into_item)
    }

    pub fn locks_held_by(&self, tid: TxnId) -> Vec<(String, LockMode)> {
        self.locks.lock().locks_held_by(tid)
    }

    pub(crate) fn unsupported(&self, command: &str) -> ShardError {
        ShardError::Unsupported {
            command: command.to_string(),
            shard: self.kind,
        }
    }

    /// Inventory operations must name this shard's own item kind
    pub(crate) fn check_item_kind(&self, kind: ItemKind, verb: ItemVerb) -> Result<()> {
        if self.kind.item_kind() == Some(kind) {
            Ok(())
        } else {
            Err(self.unsupported(verb.wire_name(kind)))
        }
    }

    /// Run `f` against the transaction's view of the shard.
    ///
    /// Prepared transactions are frozen and rejected here.
    pub(crate) fn with_txn<R>(
        &self,
        tid: TxnId,
        f: impl FnOnce(&mut TxnScope<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut table = self.transactions.lock();
        if table
            .contexts
            .get(&tid)
            .is_some_and(|c| c.phase == TxnPhase::Prepared)
        {
            return Err(ShardError::AlreadyPrepared(tid));
        }

        let mut scope = TxnScope {
            store: self,
            tid,
            table: &mut *table,
        };
        f(&mut scope)
    }

    /// Drop a transaction's workspace and locks
    pub(crate) fn discard(&self, table: &mut TransactionTable, tid: TxnId) {
        table.contexts.remove(&tid);
        self.locks.lock().release_all(tid);
    }
}

/// A transaction's view of the shard while it holds the transaction table
pub(crate) struct TxnScope<'a> {
    pub(crate) store: &'a ShardStore,
    pub(crate) tid: TxnId,
    pub(crate) table: &'a mut TransactionTable,
}

impl TxnScope<'_> {
    /// Request a lock; a granted lock makes the transaction live on this shard
    pub(crate) fn acquire(&mut self, key: &str, mode: LockMode) -> LockOutcome {
        let outcome = self.store.locks.lock().acquire(self.tid, key, mode);
        if outcome.is_granted() {
            self.table.contexts.entry(self.tid).or_default();
        }
        outcome
    }

    /// Acquire or fail with `LockDenied`
    pub(crate) fn lock(&mut self, key: &str, mode: LockMode) -> Result<()> {
        match self.acquire(key, mode) {
            LockOutcome::Granted => Ok(()),
            LockOutcome::Blocked { holders } => {
                warn!(
                    shard = %self.store.kind,
                    tid = %self.tid,
                    key,
                    ?mode,
                    ?holders,
                    "Lock denied"
                );
                Err(ShardError::LockDenied {
                    key: key.to_string(),
                    holders: holders.into_iter().map(|(h, _)| h).collect(),
                })
            }
            LockOutcome::Deadlock => Err(ShardError::LockDenied {
                key: key.to_string(),
                holders: Vec::new(),
            }),
        }
    }

    /// Staged value if present, otherwise a copy of the committed value
    pub(crate) fn read(&self, key: &str) -> Option<Record> {
        if let Some(staged) = self
            .table
            .contexts
            .get(&self.tid)
            .and_then(|c| c.staged(key))
        {
            return staged.clone();
        }
        self.store.committed.read().get(key).cloned()
    }

    pub(crate) fn read_item(&self, key: &str) -> Option<ReservableItem> {
        self.read(key).and_then(Record::into_item)
    }

    pub(crate) fn write(&mut self, key: &str, value: Option<Record>) {
        self.table
            .contexts
            .entry(self.tid)
            .or_default()
            .stage(key.to_string(), value);
    }

    /// Whether a key exists committed or is staged by any transaction
    pub(crate) fn is_known(&self, key: &str) -> bool {
        self.store.committed.read().contains_key(key)
            || self
                .table
                .contexts
                .values()
                .any(|c| c.staged(key).is_some())
    }
}
