//! Error types for the coordinator

use std::net::SocketAddr;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;
use travel_common::ShardKind;

/// Coordinator error types
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("No endpoint configured for {0}")]
    MissingShard(ShardKind),

    #[error("Transaction queue is closed")]
    QueueClosed,

    #[error("Client connection closed")]
    ClientGone,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
