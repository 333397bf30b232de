//! Execution of queued transactions
//!
//! An [`Executor`] takes one [`TxnRequest`] at a time through three stages:
//! - dispatch: each batched line is routed to its shard, or expanded into a
//!   multi-shard sequence for reservations, bundles and deletes
//! - fail-fast: the first `FAIL`/`ERROR` stops the batch
//! - decision: two-phase commit across every shard the batch touched

mod dispatch;
mod reservation;
mod two_phase;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};
use travel_common::{ShardKind, TxnId};
use travel_protocol::{OpEcho, Reply, ShardCommand, TxnOutcome, TxnResult};
use travel_shard_client::{ShardConnection, ShardTransport};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::request::TxnRequest;
use crate::transaction::TransactionManager;

/// Reason used when a command targets a shard with no transport
pub const NO_SHARD: &str = "NO_SHARD";

/// One transport per shard kind
#[derive(Clone, Default)]
pub struct ShardSet {
    transports: BTreeMap<ShardKind, Arc<dyn ShardTransport>>,
}

impl ShardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily dialled connections to every configured shard
    pub fn connect(config: &CoordinatorConfig) -> Result<Self> {
        let mut shards = Self::new();
        for kind in ShardKind::ALL {
            let addr = config
                .endpoint(kind)
                .ok_or(CoordinatorError::MissingShard(kind))?;
            shards.insert(Arc::new(ShardConnection::new(
                kind,
                addr,
                config.connect_timeout,
                config.read_timeout,
            )));
        }
        Ok(shards)
    }

    /// Register a transport under the kind it reports
    pub fn insert(&mut self, transport: Arc<dyn ShardTransport>) {
        self.transports.insert(transport.kind(), transport);
    }

    pub fn get(&self, kind: ShardKind) -> Option<&Arc<dyn ShardTransport>> {
        self.transports.get(&kind)
    }

}

/// Runs batched transactions against the shards
pub struct Executor {
    manager: Arc<TransactionManager>,
    shards: ShardSet,
}

impl Executor {
    pub fn new(manager: Arc<TransactionManager>, shards: ShardSet) -> Self {
        Self { manager, shards }
    }

    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Execute a request to its decision and build the result block
    pub async fn run(&self, request: &TxnRequest) -> TxnResult {
        let span = info_span!("txn", tid = %request.tid, request_id = %request.request_id);
        self.run_batch(request).instrument(span).await
    }

    async fn run_batch(&self, request: &TxnRequest) -> TxnResult {
        let tid = request.tid;

        if request.abort {
            self.abort(tid).await;
            return TxnResult {
                tid,
                entries: Vec::new(),
                outcome: TxnOutcome::Aborted,
            };
        }

        let mut entries = Vec::with_capacity(request.operations.len());
        let mut success = true;

        for line in &request.operations {
            let (command, reply) = self.execute_line(tid, line).await;
            let failed = reply.is_failure();
            entries.push(OpEcho::new(command, reply));

            if failed {
                debug!(%tid, line = %line, "Operation failed, abandoning batch");
                success = false;
                break;
            }
        }

        let outcome = if success {
            self.commit(tid).await
        } else {
            self.abort(tid).await;
            TxnOutcome::Aborted
        };

        TxnResult {
            tid,
            entries,
            outcome,
        }
    }

    /// Send a data command to `kind`, enlisting it as a participant first
    async fn send(&self, tid: TxnId, kind: ShardKind, command: impl Into<ShardCommand>) -> Reply {
        let Some(transport) = self.shards.get(kind) else {
            return Reply::error(NO_SHARD);
        };
        self.manager.add_participant(tid, kind);
        transport.send(tid, &command.into()).await
    }
}
