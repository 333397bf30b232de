//! Fixed pool of workers draining the transaction queue

use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::request::TxnRequest;

/// Spawn `count` workers (at least one) sharing `queue`.
///
/// Each worker takes one request, runs it to its decision and delivers the
/// result block before taking the next. Workers exit once every sender of
/// the queue is dropped and the queue is drained.
pub fn spawn_workers(
    count: usize,
    executor: Arc<Executor>,
    queue: mpsc::Receiver<TxnRequest>,
) -> Vec<JoinHandle<()>> {
    let queue = Arc::new(AsyncMutex::new(queue));
    (0..count.max(1))
        .map(|worker| tokio::spawn(worker_loop(worker, executor.clone(), queue.clone())))
        .collect()
}

async fn worker_loop(
    worker: usize,
    executor: Arc<Executor>,
    queue: Arc<AsyncMutex<mpsc::Receiver<TxnRequest>>>,
) {
    debug!(worker, "Worker started");

    loop {
        let request = queue.lock().await.recv().await;
        let Some(request) = request else {
            break;
        };

        let result = executor.run(&request).await;
        debug!(worker, tid = %request.tid, outcome = %result.outcome, "Delivering result");
        if request.reply.send(result.lines()).is_err() {
            warn!(worker, tid = %request.tid, "Client left before its result was ready");
        }
    }

    info!(worker, "Transaction queue closed, worker exiting");
}
