//! # Reply Model
//!
//! The tagged value a server produces for one command. A reply is read once,
//! consumed by the client's flattening step and then dropped.

use std::fmt;

/// Text used for a nil reply once it has been converted to a response.
///
/// Distinct from the empty string so callers can tell "no value" from "".
pub const NIL: &str = "(nil)";

/// Status text the server uses for a successful command.
pub const OK: &str = "OK";

/// Raw reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    /// -ERR ... replies.
    Error(String),
    /// +OK or +PONG style replies.
    Status(String),
    /// $... bulk strings.
    BulkString(String),
    /// :123 replies.
    Integer(i64),
    /// $-1 or *-1.
    Nil,
    /// *... arrays, possibly nested.
    Array(Vec<ReplyValue>),
}

impl ReplyValue {
    /// True for a server error reply (`-ERR ...`).
    pub fn is_error(&self) -> bool {
        matches!(self, ReplyValue::Error(_))
    }
}

impl fmt::Display for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyValue::Error(message) => write!(f, "(error) {}", message),
            ReplyValue::Status(text) | ReplyValue::BulkString(text) => f.write_str(text),
            ReplyValue::Integer(value) => write!(f, "(integer) {}", value),
            ReplyValue::Nil => f.write_str(NIL),
            ReplyValue::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}
