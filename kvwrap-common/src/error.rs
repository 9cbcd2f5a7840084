//! # Transport Errors
//!
//! Failures raised below the client core: establishing a session and moving
//! one command/reply pair across it.

use std::io;

use thiserror::Error;

/// Failure while sending a command or reading its reply.
///
/// All variants are recoverable from the client's point of view: the caller
/// may reconnect and retry.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The peer closed the stream before a reply arrived.
    #[error("reply is null")]
    NoReply,
    /// No live session exists to send on.
    #[error("not connected")]
    NotConnected,
}

/// Failure while establishing a session with the server.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Neither a socket path nor a host and port were configured.
    #[error("no endpoint configured: need a socket path or a host and port")]
    NoEndpoint,
    /// Host and port could not be resolved to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// The platform cannot open local socket paths.
    #[error("unix socket endpoints are not supported on this platform")]
    UnsupportedSocket,
    /// The connect call itself failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: io::Error,
    },
}
