//! Two-phase commit participant capability

use tracing::{debug, warn};
use travel_common::TxnId;

use crate::engine::ShardStore;
use crate::error::{Result, ShardError};
use crate::storage::{Record, TxnPhase};

/// A resource that takes part in two-phase commit
///
/// Note: every method is idempotent. A transaction the participant has
/// never seen (or has already finished) prepares, commits and aborts
/// trivially.
pub trait TransactionParticipant: Send + Sync {
    /// Vote on the transaction (2PC phase 1)
    ///
    /// A failed vote has already aborted the transaction locally.
    fn prepare(&self, tid: TxnId) -> Result<()>;

    /// Install staged writes and release locks (2PC phase 2)
    fn commit(&self, tid: TxnId) -> Result<()>;

    /// Discard staged writes and release locks
    fn abort(&self, tid: TxnId) -> Result<()>;
}

impl TransactionParticipant for ShardStore {
    fn prepare(&self, tid: TxnId) -> Result<()> {
        let mut table = self.transactions.lock();
        let Some(ctx) = table.contexts.get_mut(&tid) else {
            return Ok(());
        };
        if ctx.phase == TxnPhase::Prepared {
            return Ok(());
        }

        let violation = ctx.writes().find_map(|(key, staged)| match staged {
            Some(Record::Item(item)) if !item.is_consistent() => Some(key.clone()),
            _ => None,
        });

        match violation {
            Some(key) => {
                warn!(shard = %self.kind(), %tid, key, "Prepare failed, aborting");
                self.discard(&mut table, tid);
                Err(ShardError::PrepareFailed(key))
            }
            None => {
                ctx.phase = TxnPhase::Prepared;
                debug!(shard = %self.kind(), %tid, "Prepared");
                Ok(())
            }
        }
    }

    fn commit(&self, tid: TxnId) -> Result<()> {
        let mut table = self.transactions.lock();
        if let Some(ctx) = table.contexts.remove(&tid) {
            let mut committed = self.committed.write();
            for (key, staged) in ctx.into_writes() {
                match staged {
                    Some(record) => {
                        committed.insert(key, record);
                    }
                    None => {
                        committed.remove(&key);
                    }
                }
            }
        }
        self.discard(&mut table, tid);
        debug!(shard = %self.kind(), %tid, "Committed");
        Ok(())
    }

    fn abort(&self, tid: TxnId) -> Result<()> {
        let mut table = self.transactions.lock();
        self.discard(&mut table, tid);
        debug!(shard = %self.kind(), %tid, "Aborted");
        Ok(())
    }
}
