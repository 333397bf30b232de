//! Typed request lines for coordinator-to-shard communication

use crate::error::{ProtocolError, Result};
use crate::operation::Operation;
use std::fmt;
use travel_common::TxnId;

/// Transaction phases in 2PC protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// Prepare phase (vote request)
    Prepare,
    /// Commit phase (decision)
    Commit,
    /// Abort phase (decision)
    Abort,
}

impl TransactionPhase {
    /// Parse a control verb, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PREPARE" => Some(Self::Prepare),
            "COMMIT" => Some(Self::Commit),
            "ABORT" => Some(Self::Abort),
            _ => None,
        }
    }

    /// Convert to the wire verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "Prepare",
            Self::Commit => "Commit",
            Self::Abort => "Abort",
        }
    }
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a shard request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardCommand {
    /// Transaction control message (prepare/commit/abort)
    Phase(TransactionPhase),
    /// Regular data operation
    Operation(Operation),
}

impl From<TransactionPhase> for ShardCommand {
    fn from(phase: TransactionPhase) -> Self {
        ShardCommand::Phase(phase)
    }
}

impl From<Operation> for ShardCommand {
    fn from(op: Operation) -> Self {
        ShardCommand::Operation(op)
    }
}

impl fmt::Display for ShardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardCommand::Phase(phase) => phase.fmt(f),
            ShardCommand::Operation(op) => op.fmt(f),
        }
    }
}

/// One `<tid>,<command>` line sent to a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRequest {
    pub tid: TxnId,
    pub command: ShardCommand,
}

impl ShardRequest {
    pub fn new(tid: TxnId, command: impl Into<ShardCommand>) -> Self {
        Self {
            tid,
            command: command.into(),
        }
    }

    /// Parse a request line received by a shard
    pub fn parse(line: &str) -> Result<Self> {
        let (raw_tid, rest) = line.split_once(',').ok_or(ProtocolError::Empty)?;
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let tid = TxnId::parse(raw_tid).map_err(|_| ProtocolError::BadTid(raw_tid.to_string()))?;

        let command = match TransactionPhase::parse(rest) {
            Some(phase) => ShardCommand::Phase(phase),
            None => ShardCommand::Operation(Operation::parse(rest)?),
        };

        Ok(Self { tid, command })
    }
}

impl fmt::Display for ShardRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.tid, self.command)
    }
}
