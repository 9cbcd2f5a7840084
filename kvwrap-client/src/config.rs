//! # Connection Configuration
//!
//! Endpoint identity, optional display name and socket timeouts for one
//! connection. Serializable so it can be embedded in application config files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kvwrap_common::ConnectError;
use serde::{Deserialize, Serialize};

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 6379;

/// Where a connection points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Local (Unix domain) socket path.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Configuration for a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Local socket path. Preferred over host and port when set.
    pub socket: Option<PathBuf>,
    /// Server host, e.g. "127.0.0.1".
    pub host: Option<String>,
    /// Server port, e.g. 6379.
    pub port: Option<u16>,
    /// Name registered with the server after every connect.
    pub name: Option<String>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional write timeout.
    pub write_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            socket: None,
            host: Some(DEFAULT_HOST.to_string()),
            port: Some(DEFAULT_PORT),
            name: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// TCP endpoint configuration.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        ConnectionConfig {
            host: Some(host.into()),
            port: Some(port),
            ..ConnectionConfig::default()
        }
    }

    /// Local socket configuration.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        ConnectionConfig {
            socket: Some(path.as_ref().to_path_buf()),
            host: None,
            port: None,
            ..ConnectionConfig::default()
        }
    }

    /// Sets the name registered after every connect.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets both read and write timeouts.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }

    /// Display name, ignoring an empty string.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Picks the endpoint to connect to: the socket path if set, otherwise
    /// host and port. Empty strings and port 0 count as unset.
    pub fn endpoint(&self) -> Result<Endpoint, ConnectError> {
        if let Some(path) = self.socket.as_ref().filter(|path| !path.as_os_str().is_empty()) {
            return Ok(Endpoint::Unix(path.clone()));
        }
        let host = self.host.as_deref().filter(|host| !host.is_empty());
        let port = self.port.filter(|port| *port > 0);
        match (host, port) {
            (Some(host), Some(port)) => Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            }),
            _ => Err(ConnectError::NoEndpoint),
        }
    }
}
