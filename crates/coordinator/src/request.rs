//! Work items on the transaction queue

use tokio::sync::mpsc;
use travel_common::TxnId;
use uuid::Uuid;

/// Where a worker delivers the result block of a request.
///
/// Each message is a whole block, written to the client without interleaving.
pub type ResultSender = mpsc::UnboundedSender<Vec<String>>;

/// A batched transaction handed from a client session to the worker pool
#[derive(Debug)]
pub struct TxnRequest {
    /// Correlates log lines of one request across session and worker
    pub request_id: Uuid,
    pub tid: TxnId,
    /// Client operation lines in submission order, ending with the `Commit` marker
    pub operations: Vec<String>,
    /// Set when the client ended the batch with `Abort`
    pub abort: bool,
    pub reply: ResultSender,
}

impl TxnRequest {
    pub fn commit(tid: TxnId, operations: Vec<String>, reply: ResultSender) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tid,
            operations,
            abort: false,
            reply,
        }
    }

    pub fn abort(tid: TxnId, reply: ResultSender) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tid,
            operations: Vec::new(),
            abort: true,
            reply,
        }
    }
}
