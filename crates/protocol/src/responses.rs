//! Reply lines returned by shards and echoed to clients

use std::fmt;

/// Reason used when a reply line cannot be classified
pub const MALFORMED_REPLY: &str = "MALFORMED_REPLY";

/// A single `OK[,<value>]`, `FAIL[,<reason>]` or `ERROR[,<reason>]` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(Option<String>),
    /// Validation, precondition, lock or integrity failure
    Fail(String),
    /// Transport or protocol failure
    Error(String),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Ok(None)
    }

    pub fn ok_with(value: impl ToString) -> Self {
        Reply::Ok(Some(value.to_string()))
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Reply::Fail(reason.into())
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Reply::Error(reason.into())
    }

    /// Classify a reply line. Anything unrecognised becomes an `ERROR`.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (status, rest) = match line.split_once(',') {
            Some((status, rest)) => (status.trim(), Some(rest.trim())),
            None => (line, None),
        };

        match status {
            "OK" => Reply::Ok(rest.filter(|v| !v.is_empty()).map(str::to_string)),
            "FAIL" => Reply::Fail(rest.unwrap_or_default().to_string()),
            "ERROR" => Reply::Error(rest.unwrap_or_default().to_string()),
            _ => Reply::Error(MALFORMED_REPLY.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }

    /// `FAIL` and `ERROR` both taint a transaction
    pub fn is_failure(&self) -> bool {
        !self.is_ok()
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Reply::Ok(value) => value.as_deref(),
            _ => None,
        }
    }

    /// Numeric payload of an `OK,<n>` reply
    pub fn value_i64(&self) -> Option<i64> {
        self.value().and_then(|v| v.parse().ok())
    }

    /// `OK,true` / `OK,false` payload
    pub fn value_bool(&self) -> Option<bool> {
        match self.value()? {
            v if v.eq_ignore_ascii_case("true") => Some(true),
            v if v.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Reply::Ok(_) => None,
            Reply::Fail(reason) | Reply::Error(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (status, detail) = match self {
            Reply::Ok(value) => ("OK", value.as_deref().unwrap_or_default()),
            Reply::Fail(reason) => ("FAIL", reason.as_str()),
            Reply::Error(reason) => ("ERROR", reason.as_str()),
        };
        if detail.is_empty() {
            f.write_str(status)
        } else {
            write!(f, "{status},{detail}")
        }
    }
}
