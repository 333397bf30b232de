use thiserror::Error;

/// Result type for identifier parsing
pub type Result<T> = std::result::Result<T, IdError>;

/// Identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Invalid transaction id: {0}")]
    InvalidTransactionId(String),

    #[error("Invalid customer id: {0}")]
    InvalidCustomerId(String),

    #[error("Unknown shard kind: {0}")]
    UnknownShardKind(String),
}
