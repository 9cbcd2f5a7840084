//! # kvwrap Client
//!
//! Purpose: Provide a small, blocking command/response layer over a
//! Redis-compatible connection: typed arguments in, typed results out, and a
//! response queue whose behavior is chosen per call.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: [`Connection`] hides transport, reply flattening and
//!    script aliases behind `cmd` and `response`.
//! 2. **Illegal States Unrepresentable**: [`CommandFlags`] only holds the four
//!    legal queue policies.
//! 3. **Failures Are Values**: Commands return a [`Response`] with a success
//!    flag; only establishing the first session returns an error.
//! 4. **Explicit Shared State**: The one process-wide resource, the "scripts
//!    already flushed" flag, is a [`ScriptFlushGuard`] handed to each
//!    connection.
//!
//! ## Logging
//! Diagnostics go through `tracing`; install a subscriber to see them.

mod config;
mod connection;
mod convert;
mod error;
mod flags;
mod flatten;
mod queue;
mod response;
mod script;
mod transport;

pub use config::{ConnectionConfig, Endpoint, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::Connection;
pub use convert::{from_wire, to_wire, truthy, Args, Discard, FromWire, IntoArgs, Presence, ToWire};
pub use error::{ClientError, ClientResult, ConversionError, PolicyConflict, ScriptLoadError};
pub use flags::{CommandFlags, Delivery, Flag, Retention};
pub use flatten::flatten_reply;
pub use queue::ResponseQueue;
pub use response::{FailureKind, Response};
pub use script::{
    is_valid_hash, ScriptCache, ScriptEntry, ScriptFlushGuard, ScriptSource, INVOKE_BY_HASH,
    SCRIPT_HASH_LENGTH,
};
pub use transport::{Connector, SocketConnector, SocketTransport, Transport};

pub use kvwrap_common::{ConnectError, ReplyValue, TransportError, NIL, OK};
