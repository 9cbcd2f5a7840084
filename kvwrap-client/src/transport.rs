//! # Transport
//!
//! Purpose: Move one command and its reply across an established session.
//! The client core only sees the [`Transport`] and [`Connector`] traits; the
//! socket implementation below is the default.
//!
//! ## Design Principles
//! 1. **Strategy Seam**: `Connection` is generic over `Connector`, so sessions
//!    can be swapped (e.g. scripted transports in tests).
//! 2. **Buffer Reuse**: Each socket transport reuses its own line and write
//!    buffers across commands.
//! 3. **Poison on Failure**: Any IO or framing error marks the transport dead;
//!    the caller reconnects instead of reusing a desynchronized stream.

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::Path;

use kvwrap_common::{encode_command, read_reply, ConnectError, ReplyValue, TransportError};
use tracing::debug;

use crate::config::{ConnectionConfig, Endpoint};

/// A live session able to run one command at a time.
pub trait Transport {
    /// Sends `argv` as one command and waits for its reply.
    fn send_command(&mut self, argv: &[String]) -> Result<ReplyValue, TransportError>;

    /// True while the session can still be used.
    fn is_live(&self) -> bool;

    /// Closes the session. Further sends fail with `NotConnected`.
    fn disconnect(&mut self);
}

/// Opens sessions to an endpoint.
pub trait Connector {
    type Transport: Transport;

    fn connect(
        &self,
        endpoint: &Endpoint,
        config: &ConnectionConfig,
    ) -> Result<Self::Transport, ConnectError>;
}

/// Connector for TCP and Unix domain sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    type Transport = SocketTransport;

    fn connect(
        &self,
        endpoint: &Endpoint,
        config: &ConnectionConfig,
    ) -> Result<SocketTransport, ConnectError> {
        let stream = match endpoint {
            Endpoint::Tcp { host, port } => Stream::Tcp(connect_tcp(host, *port, config)?),
            Endpoint::Unix(path) => connect_unix(path, config)?,
        };
        debug!(%endpoint, "socket connected");
        Ok(SocketTransport::new(stream))
    }
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn shutdown(&self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

/// Socket session with reusable buffers.
pub struct SocketTransport {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<Stream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
    live: bool,
}

impl SocketTransport {
    fn new(stream: Stream) -> Self {
        SocketTransport {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
            live: true,
        }
    }

    fn exec(&mut self, argv: &[String]) -> Result<ReplyValue, TransportError> {
        self.write_buf.clear();
        encode_command(argv, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_reply(&mut self.reader, &mut self.line_buf)
    }
}

impl Transport for SocketTransport {
    fn send_command(&mut self, argv: &[String]) -> Result<ReplyValue, TransportError> {
        if !self.live {
            return Err(TransportError::NotConnected);
        }
        let reply = self.exec(argv);
        if reply.is_err() {
            // The stream may be mid-frame; never reuse it.
            self.live = false;
        }
        reply
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn disconnect(&mut self) {
        if self.live {
            let _ = self.reader.get_ref().shutdown();
            self.live = false;
        }
    }
}

fn connect_tcp(host: &str, port: u16, config: &ConnectionConfig) -> Result<TcpStream, ConnectError> {
    let endpoint = format!("{}:{}", host, port);
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| ConnectError::InvalidAddress(endpoint.clone()))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                let io_err = |source| ConnectError::Io {
                    endpoint: endpoint.clone(),
                    source,
                };
                if let Some(timeout) = config.read_timeout {
                    stream.set_read_timeout(Some(timeout)).map_err(io_err)?;
                }
                if let Some(timeout) = config.write_timeout {
                    stream.set_write_timeout(Some(timeout)).map_err(io_err)?;
                }
                // Disable Nagle to keep request latency low for small payloads.
                stream.set_nodelay(true).map_err(io_err)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(source) => ConnectError::Io { endpoint, source },
        None => ConnectError::InvalidAddress(endpoint),
    })
}

#[cfg(unix)]
fn connect_unix(path: &Path, config: &ConnectionConfig) -> Result<Stream, ConnectError> {
    let io_err = |source| ConnectError::Io {
        endpoint: format!("unix:{}", path.display()),
        source,
    };
    let stream = UnixStream::connect(path).map_err(io_err)?;
    if let Some(timeout) = config.read_timeout {
        stream.set_read_timeout(Some(timeout)).map_err(io_err)?;
    }
    if let Some(timeout) = config.write_timeout {
        stream.set_write_timeout(Some(timeout)).map_err(io_err)?;
    }
    Ok(Stream::Unix(stream))
}

#[cfg(not(unix))]
fn connect_unix(_path: &Path, _config: &ConnectionConfig) -> Result<Stream, ConnectError> {
    Err(ConnectError::UnsupportedSocket)
}
