//! TCP front of a shard
//!
//! Each coordinator connection is a stream of `<tid>,<command>` lines.
//! Requests on one connection are handled strictly in order, one reply
//! line per request line.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::engine::ShardStore;
use crate::error::Result;

pub struct ShardServer {
    listener: TcpListener,
    store: Arc<ShardStore>,
}

impl ShardServer {
    pub async fn bind(addr: SocketAddr, store: Arc<ShardStore>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let kind = self.store.kind();
        info!(shard = %kind, addr = ?self.listener.local_addr()?, "Listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(shard = %kind, error = ?e, "Accept failed");
                            continue;
                        }
                    };
                    info!(shard = %kind, ?peer, "Accepted connection");

                    let store = self.store.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(store, stream, shutdown).await {
                            warn!(shard = %kind, ?peer, error = %e, "Connection ended with error");
                        } else {
                            info!(shard = %kind, ?peer, "Connection closed");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!(shard = %kind, "Shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn serve_connection(
    store: Arc<ShardStore>,
    stream: TcpStream,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut framed = Framed::new(stream, LinesCodec::new());

    loop {
        let line = tokio::select! {
            next = framed.next() => match next {
                Some(line) => line?,
                None => return Ok(()),
            },
            _ = shutdown.changed() => return Ok(()),
        };

        if let Some(reply) = store.handle_line(&line) {
            debug!(shard = %store.kind(), request = %line.trim(), %reply, "Replying");
            framed.send(reply.to_string()).await?;
        }
    }
}
