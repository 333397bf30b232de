//! Error types for shard connections

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Connection error types
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Timed out waiting for a reply")]
    ReadTimeout,

    #[error("Connection closed by peer")]
    Closed,

    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),
}

impl ConnectionError {
    /// Reason token used in the `ERROR,<reason>` reply handed to callers
    pub fn reason(&self) -> &'static str {
        match self {
            ConnectionError::Connect { .. } => "CONNECT_FAILED",
            ConnectionError::ConnectTimeout(_) => "CONNECT_TIMEOUT",
            ConnectionError::ReadTimeout => "READ_TIMEOUT",
            ConnectionError::Closed => "CONNECTION_CLOSED",
            ConnectionError::Codec(_) => "IO",
        }
    }
}

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;
