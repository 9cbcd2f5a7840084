//! # kvwrap-common
//!
//! Shared reply model, RESP2 framing and transport-level errors used by the
//! kvwrap client core.
//!
//! ## Design Principles
//! 1. **One Reply, One Value**: every read materializes exactly one `ReplyValue`.
//! 2. **Binary-In, Text-Out**: replies are exposed as text; bulk payloads that
//!    are not valid UTF-8 are decoded lossily.
//! 3. **Fail Fast**: invalid framing returns protocol errors immediately.

pub mod error;
pub mod reply;
pub mod resp;

pub use error::{ConnectError, TransportError};
pub use reply::{ReplyValue, NIL, OK};
pub use resp::{encode_command, read_reply};
