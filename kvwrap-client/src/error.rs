//! # Client Errors
//!
//! Error kinds surfaced by the client core. Only connection establishment is
//! returned as a hard error from constructors; everything else reaches the
//! caller either as a failed `Response` or through the typed `*_as` helpers.

use std::io;

use kvwrap_common::{ConnectError, TransportError};
use thiserror::Error;

/// Result type for the client core.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not establish a session. Fatal at construction time.
    #[error("connection error: {0}")]
    Connect(#[from] ConnectError),
    /// Send/receive failed and the single retry failed too.
    #[error("transport error: {0}")]
    Transport(String),
    /// Server returned an error reply.
    #[error("server error: {0}")]
    Protocol(String),
    /// A response payload could not be converted to the requested type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Read from an empty response queue.
    #[error("queue underflow: {0}")]
    QueueUnderflow(String),
    /// Script registration was rejected.
    #[error(transparent)]
    ScriptLoad(#[from] ScriptLoadError),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// A value could not be converted to or from its wire text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {input:?} to {target}")]
pub struct ConversionError {
    /// Name of the requested type.
    pub target: &'static str,
    /// Text (or a description of the value) that failed to convert.
    pub input: String,
}

impl ConversionError {
    /// Builds an error for `input` that could not become a `target`.
    pub fn new(target: &'static str, input: impl Into<String>) -> Self {
        ConversionError {
            target,
            input: input.into(),
        }
    }
}

/// Why a script was not added to the script cache.
#[derive(Debug, Error)]
pub enum ScriptLoadError {
    /// The server answered with something that is not a script hash.
    #[error("script '{alias}' returned an invalid hash {hash:?} (expected {expected} hex characters)")]
    BadHash {
        alias: String,
        hash: String,
        expected: usize,
    },
    /// The load command itself failed.
    #[error("script '{alias}' could not be loaded: {reason}")]
    NotLoaded { alias: String, reason: String },
    /// The alias is already registered on this connection.
    #[error("script alias '{0}' is already registered")]
    AliasTaken(String),
    /// The script file could not be read.
    #[error("script '{alias}' could not be read from {path}: {source}")]
    Read {
        alias: String,
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Contradictory or unrecognized command flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyConflict {
    #[error("illegal command flags: FLUSH and PERSIST are mutually exclusive")]
    FlushAndPersist,
    #[error("illegal command flags: QUEUE and DISCARD are mutually exclusive")]
    QueueAndDiscard,
    #[error("unknown command flag {0:?}")]
    UnknownFlag(String),
}
