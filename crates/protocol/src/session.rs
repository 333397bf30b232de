//! Client session lines and the transaction result block
//!
//! A client opens a transaction with `Start` (answered by `TID,<n>`), sends
//! operation lines, and closes it with `Commit` or `Abort`. The coordinator
//! answers the terminator with a block:
//!
//! ```text
//! TXN_RESULT_BEGIN
//! AddFlight -> OK
//! Commit -> OK
//! Transaction 1 COMMITTED
//! TXN_RESULT_END
//! ```

use crate::error::{ProtocolError, Result};
use std::fmt;
use travel_common::TxnId;

pub const TXN_RESULT_BEGIN: &str = "TXN_RESULT_BEGIN";
pub const TXN_RESULT_END: &str = "TXN_RESULT_END";
pub const NO_ACTIVE_TRANSACTION: &str = "ERROR,NO_ACTIVE_TRANSACTION";

const ECHO_SEPARATOR: &str = " -> ";

/// A line received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    Start,
    Commit,
    Abort,
    Quit,
    /// Anything else, kept verbatim (trimmed) for batching
    Operation(String),
}

impl ClientLine {
    /// Classify a client line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let parsed = match line.to_ascii_lowercase().as_str() {
            "start" => ClientLine::Start,
            "commit" => ClientLine::Commit,
            "abort" => ClientLine::Abort,
            "quit" => ClientLine::Quit,
            _ => ClientLine::Operation(line.to_string()),
        };
        Some(parsed)
    }

    /// Reply to `Start`
    pub fn tid_line(tid: TxnId) -> String {
        format!("TID,{tid}")
    }

    /// Extract the tid from a `TID,<n>` reply
    pub fn parse_tid_line(line: &str) -> Result<TxnId> {
        let raw = line
            .trim()
            .strip_prefix("TID,")
            .ok_or_else(|| ProtocolError::BadTid(line.to_string()))?;
        TxnId::parse(raw).map_err(|_| ProtocolError::BadTid(raw.to_string()))
    }
}

/// Final decision reported in a result block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    Committed,
    Aborted,
}

impl fmt::Display for TxnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnOutcome::Committed => f.write_str("COMMITTED"),
            TxnOutcome::Aborted => f.write_str("ABORTED"),
        }
    }
}

/// `<command> -> <result>` line of a result block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpEcho {
    pub command: String,
    pub result: String,
}

impl OpEcho {
    pub fn new(command: impl Into<String>, result: impl ToString) -> Self {
        Self {
            command: command.into(),
            result: result.to_string(),
        }
    }
}

impl fmt::Display for OpEcho {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{ECHO_SEPARATOR}{}", self.command, self.result)
    }
}

/// Everything a worker reports back for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnResult {
    pub tid: TxnId,
    pub entries: Vec<OpEcho>,
    pub outcome: TxnOutcome,
}

impl TxnResult {
    pub fn is_committed(&self) -> bool {
        self.outcome == TxnOutcome::Committed
    }

    /// Result for the operation whose echoed command is `command`
    pub fn result_of(&self, command: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.command == command)
            .map(|e| e.result.as_str())
    }

    fn outcome_line(&self) -> String {
        format!("Transaction {} {}", self.tid, self.outcome)
    }

    /// The block as individual lines, without terminators
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.entries.len() + 3);
        lines.push(TXN_RESULT_BEGIN.to_string());
        lines.extend(self.entries.iter().map(OpEcho::to_string));
        lines.push(self.outcome_line());
        lines.push(TXN_RESULT_END.to_string());
        lines
    }

    /// Parse a complete block as read by a client
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let lines: Vec<&str> = lines.iter().map(|l| l.as_ref().trim()).collect();
        let malformed = |detail: &str| ProtocolError::MalformedResult(detail.to_string());

        match (lines.first(), lines.last()) {
            (Some(&TXN_RESULT_BEGIN), Some(&TXN_RESULT_END)) if lines.len() >= 3 => {}
            _ => return Err(malformed("missing block delimiters")),
        }

        let body = &lines[1..lines.len() - 1];
        let (outcome_line, echoes) = body
            .split_last()
            .ok_or_else(|| malformed("missing outcome"))?;

        let mut words = outcome_line.split_whitespace();
        let (Some("Transaction"), Some(raw_tid), Some(raw_outcome), None) =
            (words.next(), words.next(), words.next(), words.next())
        else {
            return Err(malformed(outcome_line));
        };
        let tid = TxnId::parse(raw_tid).map_err(|_| ProtocolError::BadTid(raw_tid.to_string()))?;
        let outcome = match raw_outcome {
            "COMMITTED" => TxnOutcome::Committed,
            "ABORTED" => TxnOutcome::Aborted,
            other => return Err(malformed(other)),
        };

        let entries = echoes
            .iter()
            .map(|line| {
                line.split_once(ECHO_SEPARATOR)
                    .map(|(command, result)| OpEcho::new(command, result))
                    .ok_or_else(|| malformed(line))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tid,
            entries,
            outcome,
        })
    }
}

impl fmt::Display for TxnResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
