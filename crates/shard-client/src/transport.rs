use async_trait::async_trait;
use travel_common::{ShardKind, TxnId};
use travel_protocol::{Reply, ShardCommand};

/// Request/reply channel to one shard
#[async_trait]
pub trait ShardTransport: Send + Sync {
    /// Shard this transport talks to
    fn kind(&self) -> ShardKind;

    /// Send `<tid>,<command>` and wait for the reply line.
    ///
    /// Transport failures are reported as `ERROR` replies, never as panics
    /// or hangs, so callers can treat them like any other failed operation.
    async fn send(&self, tid: TxnId, command: &ShardCommand) -> Reply;
}
