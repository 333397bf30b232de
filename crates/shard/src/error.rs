//! Shard error types

use thiserror::Error;
use tokio_util::codec::LinesCodecError;
use travel_common::{ShardKind, TxnId};
use travel_protocol::ProtocolError;

/// Result type for shard operations
pub type Result<T> = std::result::Result<T, ShardError>;

/// Errors raised by the shard store
#[derive(Debug, Error)]
pub enum ShardError {
    #[error("Lock denied on {key} (held by {holders:?})")]
    LockDenied { key: String, holders: Vec<TxnId> },

    #[error("Transaction {0} is prepared and accepts no further operations")]
    AlreadyPrepared(TxnId),

    #[error("No record for {0}")]
    NotFound(String),

    #[error("Record {0} already exists")]
    AlreadyExists(String),

    #[error("No units available for {0}")]
    NoInventory(String),

    #[error("{0} has outstanding reservations")]
    HasReservations(String),

    #[error("Cannot roll back {count} units of {key}")]
    RollbackFailed { key: String, count: i64 },

    #[error("Key {0} belongs to another shard")]
    WrongShard(String),

    #[error("{command} is not handled by {shard}")]
    Unsupported { command: String, shard: ShardKind },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Prepare failed: {0}")]
    PrepareFailed(String),

    #[error("Shard has {0} live transactions")]
    Busy(usize),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Codec(#[from] LinesCodecError),
}

impl ShardError {
    pub(crate) fn overflow(key: &str) -> Self {
        ShardError::InvalidArgument(format!("count overflow on {key}"))
    }

    /// Reason token sent back as `FAIL,<reason>`
    pub fn reason(&self) -> &'static str {
        match self {
            ShardError::LockDenied { .. } => "LOCK_DENIED",
            ShardError::AlreadyPrepared(_) => "ALREADY_PREPARED",
            ShardError::NotFound(_) => "NOT_FOUND",
            ShardError::AlreadyExists(_) => "ALREADY_EXISTS",
            ShardError::NoInventory(_) => "NO_INVENTORY",
            ShardError::HasReservations(_) => "HAS_RESERVATIONS",
            ShardError::RollbackFailed { .. } => "ROLLBACK_FAILED",
            ShardError::WrongShard(_) => "WRONG_SHARD",
            ShardError::Unsupported { .. } => "UNKNOWN_CMD",
            ShardError::InvalidArgument(_) => "BAD_ARGS",
            ShardError::PrepareFailed(_) => "PREPARE_FAILED",
            ShardError::Busy(_) => "BUSY",
            ShardError::Snapshot(_) => "SNAPSHOT_FAILED",
            ShardError::Protocol(e) => e.reason(),
            ShardError::Io(_) | ShardError::Codec(_) => "IO",
        }
    }
}
