//! Two-phase commit across the shards a transaction touched

use futures_util::future::join_all;
use tracing::{debug, info, warn};
use travel_common::{ShardKind, TxnId};
use travel_protocol::{Reply, ShardCommand, TransactionPhase, TxnOutcome};

use super::{Executor, NO_SHARD};

impl Executor {
    /// Prepare every participant and commit if all of them vote yes.
    ///
    /// A commit that fails after a unanimous prepare is logged and the
    /// transaction still counts as committed.
    pub(super) async fn commit(&self, tid: TxnId) -> TxnOutcome {
        let participants = self.manager.participants(tid);

        let votes = self
            .broadcast(tid, &participants, TransactionPhase::Prepare)
            .await;
        let rejected: Vec<_> = votes.iter().filter(|(_, reply)| !reply.is_ok()).collect();
        if !rejected.is_empty() {
            for (shard, reply) in &rejected {
                warn!(%tid, %shard, %reply, "Prepare rejected");
            }
            self.abort(tid).await;
            return TxnOutcome::Aborted;
        }

        let acks = self
            .broadcast(tid, &participants, TransactionPhase::Commit)
            .await;
        for (shard, reply) in acks.iter().filter(|(_, reply)| !reply.is_ok()) {
            warn!(%tid, %shard, %reply, "Commit failed after successful prepare");
        }

        if !self.manager.commit(tid) {
            warn!(%tid, status = ?self.manager.status(tid), "Commit recorded on an ended transaction");
        }
        self.manager.retire(tid);
        info!(%tid, participants = participants.len(), "Transaction committed");
        TxnOutcome::Committed
    }

    /// Abort locally and tell every participant to discard its workspace
    pub(super) async fn abort(&self, tid: TxnId) {
        if !self.manager.abort(tid) {
            debug!(%tid, status = ?self.manager.status(tid), "Transaction already ended");
        }

        let participants = self.manager.participants(tid);
        let acks = self
            .broadcast(tid, &participants, TransactionPhase::Abort)
            .await;
        for (shard, reply) in acks.iter().filter(|(_, reply)| !reply.is_ok()) {
            warn!(%tid, %shard, %reply, "Abort not acknowledged");
        }
        self.manager.retire(tid);
        info!(%tid, participants = participants.len(), "Transaction aborted");
    }

    /// Send one phase message to each participant concurrently
    async fn broadcast(
        &self,
        tid: TxnId,
        participants: &[ShardKind],
        phase: TransactionPhase,
    ) -> Vec<(ShardKind, Reply)> {
        let command: ShardCommand = phase.into();
        let sends = participants.iter().map(|&shard| {
            let command = &command;
            async move {
                let reply = match self.shards.get(shard) {
                    Some(transport) => transport.send(tid, command).await,
                    None => Reply::error(NO_SHARD),
                };
                (shard, reply)
            }
        });
        join_all(sends).await
    }
}
