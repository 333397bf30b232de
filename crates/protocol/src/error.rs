//! Protocol parse errors

use thiserror::Error;

/// Result type for protocol parsing
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing a wire line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty request")]
    Empty,

    #[error("Invalid transaction id: {0}")]
    BadTid(String),

    #[error("Bad arguments for {command}: {detail}")]
    BadArgs { command: String, detail: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Malformed result block: {0}")]
    MalformedResult(String),
}

impl ProtocolError {
    /// Reason token used when the error is reported as `FAIL,<reason>`
    pub fn reason(&self) -> &'static str {
        match self {
            ProtocolError::Empty => "EMPTY",
            ProtocolError::BadTid(_) => "BAD_TID",
            ProtocolError::BadArgs { .. } => "BAD_ARGS",
            ProtocolError::UnknownCommand(_) => "UNKNOWN_CMD",
            ProtocolError::MalformedResult(_) => "MALFORMED_RESULT",
        }
    }

    pub(crate) fn bad_args(command: &str, detail: impl Into<String>) -> Self {
        ProtocolError::BadArgs {
            command: command.to_string(),
            detail: detail.into(),
        }
    }
}
