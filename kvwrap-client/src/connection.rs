//! # Connection
//!
//! Purpose: Issue commands over one session, convert replies into
//! [`Response`]s and manage the response queue and script aliases.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Connection` hides the transport, the reply
//!    flattening and the script table behind `cmd`/`response`.
//! 2. **Retry Once**: A failed send triggers exactly one synchronous reconnect
//!    and one resend; there is no background reconnect loop.
//! 3. **Failures Are Values**: After construction, problems come back as failed
//!    responses. Only establishing the first session is a hard error.
//! 4. **Single Owner**: The queue and script table belong to one connection and
//!    are not locked; share a connection across threads only behind your own
//!    synchronization.

use std::fmt;
use std::io;
use std::path::Path;

use kvwrap_common::{ConnectError, ReplyValue, TransportError};
use tracing::{debug, error, warn};

use crate::config::{ConnectionConfig, Endpoint};
use crate::convert::{FromWire, IntoArgs};
use crate::error::{ClientResult, ScriptLoadError};
use crate::flags::CommandFlags;
use crate::flatten::flatten_reply;
use crate::queue::ResponseQueue;
use crate::response::{FailureKind, Response};
use crate::script::{is_valid_hash, ScriptCache, ScriptEntry, ScriptFlushGuard, ScriptSource, SCRIPT_HASH_LENGTH};
use crate::transport::{Connector, SocketConnector, Transport};

const EMPTY_QUEUE: &str = "no further responses have been queued";

/// A client session with a response queue and a script alias table.
///
/// ```no_run
/// use kvwrap_client::{CommandFlags, Connection};
///
/// let mut conn = Connection::tcp("127.0.0.1", 6379)?;
/// conn.cmd(CommandFlags::DEFAULT, "SET", ("foo", 123));
/// let foo: i64 = conn.cmd(CommandFlags::DEFAULT, "GET", "foo").get();
/// assert_eq!(foo, 123);
/// # Ok::<(), kvwrap_client::ClientError>(())
/// ```
pub struct Connection<C: Connector = SocketConnector> {
    config: ConnectionConfig,
    endpoint: Endpoint,
    connector: C,
    transport: Option<C::Transport>,
    responses: ResponseQueue,
    scripts: ScriptCache,
    flush_guard: ScriptFlushGuard,
    reconnects: u64,
}

impl Connection<SocketConnector> {
    /// Connects over sockets using `config`.
    pub fn open(config: ConnectionConfig) -> ClientResult<Self> {
        Connection::with_connector(config, SocketConnector, ScriptFlushGuard::process())
    }

    /// Connects to `host:port`.
    pub fn tcp(host: impl Into<String>, port: u16) -> ClientResult<Self> {
        Connection::open(ConnectionConfig::tcp(host, port))
    }

    /// Connects to a local socket path.
    pub fn unix(path: impl AsRef<Path>) -> ClientResult<Self> {
        Connection::open(ConnectionConfig::unix(path))
    }
}

impl<C: Connector> Connection<C> {
    /// Connects with an explicit connector and script flush guard.
    ///
    /// Fails if no endpoint is configured or no live session can be
    /// established. When a display name is configured it is registered with
    /// the `CLEAR` policy.
    pub fn with_connector(
        config: ConnectionConfig,
        connector: C,
        flush_guard: ScriptFlushGuard,
    ) -> ClientResult<Self> {
        let endpoint = config.endpoint()?;
        let transport = open_session(&connector, &endpoint, &config)?;
        debug!(%endpoint, name = ?config.display_name(), "connection established");

        let mut conn = Connection {
            config,
            endpoint,
            connector,
            transport: Some(transport),
            responses: ResponseQueue::new(),
            scripts: ScriptCache::new(),
            flush_guard,
            reconnects: 0,
        };

        if let Some(name) = conn.config.display_name().map(str::to_owned) {
            let response = conn.execute(
                CommandFlags::CLEAR,
                vec!["CLIENT".to_string(), "SETNAME".to_string(), name],
            );
            if !response.is_success() {
                warn!(reason = %response, "could not register connection name");
            }
        }
        Ok(conn)
    }

    /// Sends a command and returns its direct response.
    ///
    /// `name` is first looked up in the script table; a registered alias is
    /// sent as `EVALSHA <hash> <key_count> args...`. The flush half of `flags`
    /// is applied before sending, the queue half while flattening the reply.
    pub fn cmd<A: IntoArgs>(&mut self, flags: CommandFlags, name: &str, args: A) -> Response {
        let argv = self.scripts.resolve(name, args.into_args());
        self.execute(flags, argv)
    }

    /// Like [`cmd`](Self::cmd), converting the response to `T`.
    ///
    /// A failed response or an unconvertible payload is an error.
    pub fn cmd_as<T: FromWire, A: IntoArgs>(
        &mut self,
        flags: CommandFlags,
        name: &str,
        args: A,
    ) -> ClientResult<T> {
        let response = self.cmd(flags, name, args).into_result()?;
        Ok(response.try_get::<T>()?)
    }

    /// Reads one queued response, removing it when `pop` is set.
    ///
    /// By default the oldest entry is read, so repeated calls drain the queue
    /// in arrival order. `from_front` reads the newest entry instead; popping
    /// that way consumes responses out of order and is logged as a warning.
    pub fn response(&mut self, pop: bool, from_front: bool) -> Response {
        if pop && from_front {
            warn!("popping from the front of the response queue; newer responses are consumed before older ones");
        }

        let entry = if pop {
            self.responses.pop(from_front)
        } else {
            self.responses.peek(from_front).map(str::to_owned)
        };
        match entry {
            Some(payload) => Response::success(payload),
            None => Response::failure(FailureKind::QueueUnderflow, EMPTY_QUEUE),
        }
    }

    /// Like [`response`](Self::response), converting the entry to `T`.
    pub fn response_as<T: FromWire>(&mut self, pop: bool, from_front: bool) -> ClientResult<T> {
        let response = self.response(pop, from_front).into_result()?;
        Ok(response.try_get::<T>()?)
    }

    /// Reads the most recently queued response.
    pub fn last_response(&mut self, pop: bool) -> Response {
        self.response(pop, true)
    }

    /// Drops every queued response.
    pub fn flush(&mut self) {
        self.responses.clear();
    }

    /// True when at least one response is queued.
    pub fn has_response(&self) -> bool {
        !self.responses.is_empty()
    }

    /// Number of queued responses.
    pub fn num_responses(&self) -> usize {
        self.responses.len()
    }

    /// Read-only view of the response queue.
    pub fn responses(&self) -> &ResponseQueue {
        &self.responses
    }

    /// True while the current session is live.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|transport| transport.is_live())
    }

    /// Number of reconnect attempts made so far.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    /// Script aliases registered on this connection.
    pub fn scripts(&self) -> &ScriptCache {
        &self.scripts
    }

    /// Configuration this connection was opened with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Endpoint chosen from the configuration.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Display name registered with the server, if any.
    pub fn name(&self) -> Option<&str> {
        self.config.display_name()
    }

    /// Local socket path, for socket endpoints.
    pub fn socket(&self) -> Option<&Path> {
        match &self.endpoint {
            Endpoint::Unix(path) => Some(path.as_path()),
            Endpoint::Tcp { .. } => None,
        }
    }

    /// Server host, for TCP endpoints.
    pub fn host(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::Tcp { host, .. } => Some(host.as_str()),
            Endpoint::Unix(_) => None,
        }
    }

    /// Server port, for TCP endpoints.
    pub fn port(&self) -> Option<u16> {
        match &self.endpoint {
            Endpoint::Tcp { port, .. } => Some(*port),
            Endpoint::Unix(_) => None,
        }
    }

    /// Registers a script under `alias` and returns its cache entry.
    ///
    /// Every rejection is a [`ClientError::ScriptLoad`](crate::ClientError::ScriptLoad).
    ///
    /// The body is sent with `SCRIPT LOAD` using the `VOID` policy, so the
    /// response queue is left untouched. The entry is only added when the
    /// server answers with a well-formed hash. With `flush_old`, the server's
    /// script cache is flushed first, at most once per flush guard.
    pub fn try_load_script(
        &mut self,
        alias: &str,
        source: &ScriptSource,
        key_count: usize,
        flush_old: bool,
    ) -> ClientResult<ScriptEntry> {
        if self.scripts.contains(alias) {
            return Err(ScriptLoadError::AliasTaken(alias.to_string()).into());
        }
        let body = source.read(alias)?;

        if flush_old {
            self.flush_server_scripts();
        }

        let response = self.execute(
            CommandFlags::VOID,
            vec!["SCRIPT".to_string(), "LOAD".to_string(), body],
        );
        if !response.is_success() {
            return Err(ScriptLoadError::NotLoaded {
                alias: alias.to_string(),
                reason: response.into_payload(),
            }
            .into());
        }

        let hash = response.into_payload();
        if !is_valid_hash(&hash) {
            return Err(ScriptLoadError::BadHash {
                alias: alias.to_string(),
                hash,
                expected: SCRIPT_HASH_LENGTH,
            }
            .into());
        }

        let entry = ScriptEntry::new(hash, key_count);
        self.scripts.insert(alias, entry.clone())?;
        debug!(alias, hash = entry.hash(), key_count, "script registered");
        Ok(entry)
    }

    /// Registers a script; returns false (and logs why) when it was rejected.
    pub fn load_script(
        &mut self,
        alias: &str,
        source: ScriptSource,
        key_count: usize,
        flush_old: bool,
    ) -> bool {
        match self.try_load_script(alias, &source, key_count, flush_old) {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "script not registered");
                false
            }
        }
    }

    /// Registers inline script text under `alias`.
    pub fn load_script_from_str(
        &mut self,
        alias: &str,
        body: &str,
        key_count: usize,
        flush_old: bool,
    ) -> bool {
        self.load_script(alias, ScriptSource::inline(body), key_count, flush_old)
    }

    /// Registers the contents of a script file under `alias`.
    pub fn load_script_from_file(
        &mut self,
        alias: &str,
        path: impl AsRef<Path>,
        key_count: usize,
        flush_old: bool,
    ) -> bool {
        self.load_script(alias, ScriptSource::file(path), key_count, flush_old)
    }

    /// Queued responses, oldest first, one per line.
    pub fn responses_to_string(&self) -> String {
        let mut desc = String::new();
        for (idx, entry) in self.responses.iter().enumerate() {
            desc.push_str(&format!("\n  [{}] => '{}'", idx, entry));
        }
        desc
    }

    /// Multi-line summary of the endpoint, connectivity and queued responses.
    pub fn description(&self) -> String {
        let mut desc = String::from("Connection {");
        desc.push_str(&format!("\nName : {}", self.name().unwrap_or("")));
        match &self.endpoint {
            Endpoint::Unix(path) => desc.push_str(&format!("\nSocket : {}", path.display())),
            Endpoint::Tcp { host, port } => {
                desc.push_str(&format!("\nHost : {}", host));
                desc.push_str(&format!("\nPort : {}", port));
            }
        }
        desc.push_str(&format!("\nConnected : {}", self.is_connected()));
        desc.push_str("\n\nResponse queue : ");
        desc.push_str(&self.responses_to_string());
        desc.push_str("\n}");
        desc
    }

    fn execute(&mut self, flags: CommandFlags, argv: Vec<String>) -> Response {
        if flags.flushes() {
            self.flush();
        }
        match self.dispatch(&argv) {
            Ok(reply) => flatten_reply(reply, flags.delivery(), &mut self.responses),
            Err(failure) => failure,
        }
    }

    fn dispatch(&mut self, argv: &[String]) -> Result<ReplyValue, Response> {
        let first = match self.send(argv) {
            Ok(reply) => return Ok(reply),
            Err(err) => err,
        };
        let command = argv.first().map(String::as_str).unwrap_or("");
        warn!(command, error = %first, "command failed; reconnecting once");

        if let Err(err) = self.reconnect() {
            error!(command, error = %err, "reconnect failed");
            return Err(Response::failure(
                FailureKind::NotConnected,
                format!("{}; reconnection failed: {}", first, err),
            ));
        }

        self.send(argv).map_err(|err| {
            error!(command, error = %err, "command failed after reconnect");
            self.disconnect();
            Response::failure(
                FailureKind::Transport,
                format!("{} (after reconnecting once)", err),
            )
        })
    }

    fn send(&mut self, argv: &[String]) -> Result<ReplyValue, TransportError> {
        match self.transport.as_mut() {
            Some(transport) if transport.is_live() => transport.send_command(argv),
            _ => Err(TransportError::NotConnected),
        }
    }

    fn reconnect(&mut self) -> Result<(), ConnectError> {
        self.disconnect();
        self.reconnects += 1;
        let mut transport = open_session(&self.connector, &self.endpoint, &self.config)?;

        // Re-register the name directly so the caller's queue is not touched.
        if let Some(name) = self.config.display_name() {
            let argv = ["CLIENT".to_string(), "SETNAME".to_string(), name.to_string()];
            match transport.send_command(&argv) {
                Ok(reply) if reply.is_error() => {
                    warn!(error = %reply, "could not re-register connection name")
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "could not re-register connection name"),
            }
        }

        debug!(endpoint = %self.endpoint, attempt = self.reconnects, "reconnected");
        self.transport = Some(transport);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
    }

    fn flush_server_scripts(&mut self) {
        if !self.flush_guard.try_claim() {
            warn!("server-side scripts were already flushed by this process; not flushing again");
            return;
        }
        let response = self.execute(
            CommandFlags::VOID,
            vec!["SCRIPT".to_string(), "FLUSH".to_string()],
        );
        if !response.truthy() {
            warn!(reason = %response, "could not flush server-side scripts");
        }
    }
}

fn open_session<C: Connector>(
    connector: &C,
    endpoint: &Endpoint,
    config: &ConnectionConfig,
) -> Result<C::Transport, ConnectError> {
    let transport = connector.connect(endpoint, config)?;
    if !transport.is_live() {
        return Err(ConnectError::Io {
            endpoint: endpoint.to_string(),
            source: io::Error::new(io::ErrorKind::NotConnected, "session is not live"),
        });
    }
    Ok(transport)
}

impl<C: Connector> Drop for Connection<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<C: Connector> fmt::Display for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl<C: Connector> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("name", &self.name())
            .field("connected", &self.is_connected())
            .field("responses", &self.responses.len())
            .field("scripts", &self.scripts.len())
            .finish()
    }
}
