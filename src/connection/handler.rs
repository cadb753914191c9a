//! Connection Handler Module
//!
//! This module handles individual client connections to PhotonKV.
//! Each client gets its own handler task that runs in a loop,
//! reading command lines and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read up to 4 KiB        │◄├── shutdown signal ends the
//!    │  └───────────┬─────────────┘ │   loop while waiting here
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split complete lines    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute + send reply    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / server shuts down / error
//! ```
//!
//! ## Buffer Management
//!
//! Each connection owns a BytesMut buffer of not-yet-parsed bytes. TCP is a
//! stream protocol, so one read may hold half a line or several lines;
//! trailing partial data simply stays in the buffer for the next read.

use crate::commands::CommandHandler;
use crate::protocol::{LineParser, ParseError, Reply};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Maximum number of bytes read from the socket at once
pub const READ_CHUNK_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Number of currently connected clients.
    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// The client sent more than the line limit without a newline
    #[error("{0}")]
    LineTooLong(#[from] ParseError),
}

/// Handles a single client connection.
///
/// Generic over the stream so tests can drive it with in-memory mocks.
pub struct ConnectionHandler<S> {
    /// The client stream, writes buffered
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Unparsed bytes received from the client
    buffer: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    parser: LineParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Flips to true when the server shuts down
    shutdown: watch::Receiver<bool>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    /// * `shutdown` - Server shutdown signal
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            command_handler,
            parser: LineParser::new(),
            stats,
            shutdown,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Reads lines from the client, executes them, and sends back replies
    /// until the client disconnects, the server shuts down or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed by server"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(tokens) = self.next_line().await? {
                // Blank lines get no reply
                if tokens.is_empty() {
                    continue;
                }

                let reply = self.command_handler.execute(tokens).await;
                self.stats.command_processed();
                self.send_reply(&reply).await?;
            }

            let n = tokio::select! {
                read = read_chunk(self.stream.get_mut(), &mut self.buffer) => read?,
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    debug!(client = %self.addr, "Closing connection for shutdown");
                    return Ok(());
                }
            };
            self.record_read(n)?;
        }
    }

    /// Splits the next complete line off the buffer.
    ///
    /// An overlong line is reported to the client before the connection
    /// is closed.
    async fn next_line(&mut self) -> Result<Option<Vec<String>>, ConnectionError> {
        match self.parser.next_line(&mut self.buffer) {
            Ok(line) => Ok(line),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Line limit exceeded");
                self.send_reply(&Reply::error(e.to_string())).await?;
                Err(e.into())
            }
        }
    }

    /// Accounts for one read; zero bytes means the peer closed.
    fn record_read(&mut self, n: usize) -> Result<(), ConnectionError> {
        if n == 0 {
            if !self.buffer.is_empty() {
                debug!(
                    client = %self.addr,
                    discarded = self.buffer.len(),
                    "Peer closed with a partial line buffered"
                );
            }
            return Err(ConnectionError::ClientDisconnected);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends a reply to the client.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Reads up to one chunk from `reader` into `buffer`.
async fn read_chunk<R>(reader: &mut R, buffer: &mut BytesMut) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    buffer.reserve(READ_CHUNK_SIZE);
    reader.take(READ_CHUNK_SIZE as u64).read_buf(buffer).await
}

/// Resolves once the shutdown flag is set or its sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, shutdown);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
