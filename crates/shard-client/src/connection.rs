//! Long-lived line connection to a shard
//!
//! One connection is shared by every coordinator worker. The send/receive
//! pair runs under an async mutex so replies always pair with their request.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};
use travel_common::{ShardKind, TxnId};
use travel_protocol::{Reply, ShardCommand, ShardRequest};

use crate::error::{ConnectionError, Result};
use crate::transport::ShardTransport;

type LineStream = Framed<TcpStream, LinesCodec>;

/// Attempts per request: the first send plus one retry after reconnecting
const ATTEMPTS: usize = 2;

pub struct ShardConnection {
    kind: ShardKind,
    addr: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    stream: AsyncMutex<Option<LineStream>>,
}

impl ShardConnection {
    /// Create a connection that dials lazily on first use
    pub fn new(
        kind: ShardKind,
        addr: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            addr: addr.into(),
            connect_timeout,
            read_timeout,
            stream: AsyncMutex::new(None),
        }
    }

    /// Create a connection and dial it immediately
    pub async fn connect(
        kind: ShardKind,
        addr: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let connection = Self::new(kind, addr, connect_timeout, read_timeout);
        let stream = connection.dial().await?;
        *connection.stream.lock().await = Some(stream);
        Ok(connection)
    }

    /// Send one line and read one line back, reconnecting and retrying once
    pub async fn request(&self, line: &str) -> Result<String> {
        let mut guard = self.stream.lock().await;
        let mut last_error = None;

        for attempt in 1..=ATTEMPTS {
            if guard.is_none() {
                match self.dial().await {
                    Ok(stream) => *guard = Some(stream),
                    Err(e) => {
                        warn!(shard = %self.kind, addr = %self.addr, attempt, error = %e, "Connect failed");
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            let Some(stream) = guard.as_mut() else {
                continue;
            };
            match exchange(stream, line, self.read_timeout).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    warn!(shard = %self.kind, attempt, error = %e, "Request failed, dropping connection");
                    *guard = None;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ConnectionError::Closed))
    }

    async fn dial(&self) -> Result<LineStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ConnectionError::ConnectTimeout(self.addr.clone()))?
            .map_err(|source| ConnectionError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        info!(shard = %self.kind, addr = %self.addr, "Connected to shard");
        Ok(Framed::new(stream, LinesCodec::new()))
    }
}

async fn exchange(stream: &mut LineStream, line: &str, read_timeout: Duration) -> Result<String> {
    stream.send(line).await?;
    match timeout(read_timeout, stream.next()).await {
        Err(_) => Err(ConnectionError::ReadTimeout),
        Ok(None) => Err(ConnectionError::Closed),
        Ok(Some(reply)) => Ok(reply?),
    }
}

#[async_trait]
impl ShardTransport for ShardConnection {
    fn kind(&self) -> ShardKind {
        self.kind
    }

    async fn send(&self, tid: TxnId, command: &ShardCommand) -> Reply {
        let request = ShardRequest::new(tid, command.clone());
        let line = request.to_string();

        match self.request(&line).await {
            Ok(reply) => {
                debug!(shard = %self.kind, request = %line, %reply, "Shard replied");
                Reply::parse(&reply)
            }
            Err(e) => {
                warn!(shard = %self.kind, request = %line, error = %e, "Shard unreachable");
                Reply::error(e.reason())
            }
        }
    }
}
