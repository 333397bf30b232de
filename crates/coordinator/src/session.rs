//! Per-connection batching state
//!
//! Operations sent between `Start` and `Commit`/`Abort` are only buffered;
//! nothing reaches a shard until the batch is handed to the worker pool.

use tracing::debug;
use travel_common::TxnId;
use travel_protocol::{ClientLine, NO_ACTIVE_TRANSACTION};

use crate::transaction::TransactionManager;

/// What the connection should do after a client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write this line back immediately
    Reply(String),
    /// Queue the batch for a worker
    Submit {
        tid: TxnId,
        operations: Vec<String>,
        abort: bool,
    },
    /// Line buffered, nothing to send
    Buffered,
    Close,
}

#[derive(Debug, Default)]
pub struct Session {
    active: Option<TxnId>,
    batch: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transaction currently being batched
    pub fn active(&self) -> Option<TxnId> {
        self.active
    }

    pub fn handle(&mut self, line: ClientLine, manager: &TransactionManager) -> SessionAction {
        match (line, self.active) {
            (ClientLine::Quit, _) => SessionAction::Close,

            (ClientLine::Start, None) => {
                let tid = manager.begin();
                self.active = Some(tid);
                self.batch.clear();
                debug!(%tid, "Batching started");
                SessionAction::Reply(ClientLine::tid_line(tid))
            }

            (ClientLine::Commit, Some(tid)) => {
                let mut operations = std::mem::take(&mut self.batch);
                operations.push("Commit".to_string());
                self.active = None;
                SessionAction::Submit {
                    tid,
                    operations,
                    abort: false,
                }
            }

            (ClientLine::Abort, Some(tid)) => {
                self.batch.clear();
                self.active = None;
                SessionAction::Submit {
                    tid,
                    operations: Vec::new(),
                    abort: true,
                }
            }

            // A second Start while batching is buffered like any other line
            (ClientLine::Start, Some(_)) => {
                self.batch.push("Start".to_string());
                SessionAction::Buffered
            }

            (ClientLine::Operation(op), Some(_)) => {
                self.batch.push(op);
                SessionAction::Buffered
            }

            (_, None) => SessionAction::Reply(NO_ACTIVE_TRANSACTION.to_string()),
        }
    }
}
