//! Client-facing front end of the coordinator
//!
//! Each client connection gets a reader that batches lines into a
//! [`Session`] and a writer task that serialises everything sent back to
//! that client: `TID` replies from the reader and whole result blocks from
//! workers.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};
use travel_protocol::ClientLine;

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::executor::{Executor, ShardSet};
use crate::request::{ResultSender, TxnRequest};
use crate::session::{Session, SessionAction};
use crate::transaction::TransactionManager;
use crate::worker::spawn_workers;

pub struct CoordinatorServer {
    listener: TcpListener,
    executor: Arc<Executor>,
    workers: usize,
    queue_capacity: usize,
}

impl CoordinatorServer {
    /// Bind the client listener; shard connections are dialled on first use
    pub async fn bind(config: &CoordinatorConfig, shards: ShardSet) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| CoordinatorError::Bind {
                addr: config.listen,
                source,
            })?;
        let manager = Arc::new(TransactionManager::new());

        Ok(Self {
            listener,
            executor: Arc::new(Executor::new(manager, shards)),
            workers: config.workers,
            queue_capacity: config.queue_capacity.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn manager(&self) -> Arc<TransactionManager> {
        self.executor.manager().clone()
    }

    /// Serve clients until `shutdown` flips to true or its sender is dropped.
    ///
    /// Queued transactions are still finished before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let (queue, receiver) = mpsc::channel(self.queue_capacity);
        let workers = spawn_workers(self.workers, self.executor.clone(), receiver);
        info!(addr = ?self.listener.local_addr()?, workers = workers.len(), "Coordinator listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(error = ?e, "Accept failed");
                            continue;
                        }
                    };
                    info!(?peer, "Client connected");

                    let manager = self.executor.manager().clone();
                    let queue = queue.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        match serve_client(stream, manager, queue, shutdown).await {
                            Ok(()) => info!(?peer, "Client disconnected"),
                            Err(e) => warn!(?peer, error = %e, "Client connection ended with error"),
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        drop(queue);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "Worker task failed");
            }
        }
        Ok(())
    }
}

async fn serve_client(
    stream: TcpStream,
    manager: Arc<TransactionManager>,
    queue: mpsc::Sender<TxnRequest>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (mut sink, mut lines) = Framed::new(stream, LinesCodec::new()).split();
    let (outbound, mut pending) = mpsc::unbounded_channel::<Vec<String>>();

    let writer = tokio::spawn(async move {
        while let Some(block) = pending.recv().await {
            for line in block {
                sink.feed(line).await?;
            }
            sink.flush().await?;
        }
        Ok::<_, LinesCodecError>(())
    });

    let mut session = Session::new();
    let outcome = read_client(
        &mut session,
        &mut lines,
        &manager,
        &queue,
        &outbound,
        &mut shutdown,
    )
    .await;

    // A batch that never reached Commit/Abort touched no shard
    if let Some(tid) = session.active() {
        manager.abort(tid);
        debug!(%tid, "Dropped unfinished batch");
    }

    // Pending requests still hold senders, so their results are written first
    drop(outbound);
    writer.await.map_err(|_| CoordinatorError::ClientGone)??;
    outcome
}

async fn read_client<S>(
    session: &mut Session,
    lines: &mut S,
    manager: &TransactionManager,
    queue: &mpsc::Sender<TxnRequest>,
    outbound: &ResultSender,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()>
where
    S: futures_util::Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin,
{
    loop {
        let line = tokio::select! {
            next = lines.next() => match next {
                Some(line) => line?,
                None => return Ok(()),
            },
            _ = shutdown.changed() => return Ok(()),
        };

        let Some(line) = ClientLine::parse(&line) else {
            continue;
        };

        match session.handle(line, manager) {
            SessionAction::Reply(reply) => {
                outbound
                    .send(vec![reply])
                    .map_err(|_| CoordinatorError::ClientGone)?;
            }
            SessionAction::Submit {
                tid,
                operations,
                abort,
            } => {
                let request = if abort {
                    TxnRequest::abort(tid, outbound.clone())
                } else {
                    TxnRequest::commit(tid, operations, outbound.clone())
                };
                debug!(%tid, request_id = %request.request_id, abort, "Queueing transaction");
                queue
                    .send(request)
                    .await
                    .map_err(|_| CoordinatorError::QueueClosed)?;
            }
            SessionAction::Buffered => {}
            SessionAction::Close => return Ok(()),
        }
    }
}
