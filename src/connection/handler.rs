//! Connection Handler Module
//!
//! This module handles individual broker connections.
//! Each connection gets its own handler task that runs in a loop,
//! reading lines, dispatching them, and writing whatever the broker
//! routes back to this connection.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Peer connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned with a fresh ConnectionHandle
//!        │
//!        ▼
//! 3. ┌─────────────────────────────────────────────┐
//!    │               Main Loop                     │
//!    │                                             │
//!    │  ┌──────────────────┐  ┌──────────────────┐ │
//!    │  │ Read bytes from  │  │ Outbound line    │ │
//!    │  │ socket           │  │ routed by another│ │
//!    │  └────────┬─────────┘  │ connection       │ │
//!    │           │            └────────┬─────────┘ │
//!    │           ▼                     │           │
//!    │  ┌──────────────────┐           │           │
//!    │  │ Dispatch each    │           │           │
//!    │  │ complete line    │           │           │
//!    │  └────────┬─────────┘           │           │
//!    │           ▼                     ▼           │
//!    │  ┌──────────────────────────────────────┐   │
//!    │  │          Write line + flush          │   │
//!    │  └──────────────────────────────────────┘   │
//!    └─────────────────────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / UNREGISTER_CLIENT / I/O error
//!        │
//!        ▼
//! 5. Outbound channel closed, pending results evicted, socket dropped
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. TCP is a stream
//! protocol - a read may hold half a line or several lines at once.

use crate::connection::handle::ConnectionHandle;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::protocol::{LineParser, ParseError};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total lines processed
    pub lines_processed: AtomicU64,
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

    pub fn line_processed(&self) {
        self.lines_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single broker connection.
///
/// The handler is the sole owner of the stream. Other connections reach it
/// through the outbound receiver paired with its [`ConnectionHandle`].
pub struct ConnectionHandler<S> {
    /// The byte stream for this connection
    stream: BufWriter<S>,

    /// This connection's identity as seen by the rest of the broker
    handle: ConnectionHandle,

    /// Lines routed to this connection by other handlers
    outbound: UnboundedReceiver<String>,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Line framer
    parser: LineParser,

    /// The dispatcher (shared across connections)
    dispatcher: Dispatcher,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream for this connection
    /// * `addr` - The peer's socket address
    /// * `dispatcher` - The dispatcher for executing lines
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        dispatcher: Dispatcher,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        let (handle, outbound) = ConnectionHandle::channel(addr);

        Self {
            stream: BufWriter::new(stream),
            handle,
            outbound,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: LineParser::new(),
            dispatcher,
            stats,
        }
    }

    /// Overrides the line framer (mainly to lower the line limit).
    pub fn with_parser(mut self, parser: LineParser) -> Self {
        self.parser = parser;
        self
    }

    /// Runs the connection until it closes.
    ///
    /// Whatever ends the loop, the outbound channel is closed and every
    /// pending result this connection was waiting for is evicted, exactly
    /// once, before the stream is dropped.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let addr = self.handle.peer();
        info!(client = %addr, conn = %self.handle.id(), "Connection opened");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %addr, "Connection closed gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    info!(client = %addr, "Connection closed")
                }
                ConnectionError::Io(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %addr, "Connection reset by peer")
                }
                _ => warn!(client = %addr, error = %e, "Connection error"),
            },
        }

        // Stop accepting routed lines before evicting, so a result racing
        // the teardown fails to deliver instead of vanishing into the channel
        self.close_outbound();
        self.dispatcher.release(&self.handle);
        self.stats.connection_closed();
        result
    }

    /// Closes the outbound channel and drops every line still queued in it.
    ///
    /// Returns how many routed lines were never written.
    fn close_outbound(&mut self) -> usize {
        self.outbound.close();

        let mut discarded = 0;
        while let Ok(line) = self.outbound.try_recv() {
            warn!(
                client = %self.handle.peer(),
                line = %line,
                "Result discarded, connection closed before it was written"
            );
            discarded += 1;
        }
        discarded
    }

    /// The main read-dispatch-write loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Dispatch every complete line already buffered
            while let Some(line) = self.try_next_line()? {
                self.stats.line_processed();
                trace!(client = %self.handle.peer(), line = %line, "Received line");

                match self.dispatcher.handle_line(&line, &self.handle) {
                    Outcome::Reply(reply) => self.write_line(&reply).await?,
                    Outcome::Silent => {}
                    Outcome::Close => return Ok(()),
                }
            }

            tokio::select! {
                read = self.stream.get_mut().read_buf(&mut self.buffer) => {
                    let n = read?;
                    if n == 0 {
                        if !self.buffer.is_empty() {
                            debug!(
                                client = %self.handle.peer(),
                                buffered = self.buffer.len(),
                                "Discarding unterminated line at end of stream"
                            );
                        }
                        return Err(ConnectionError::ClientDisconnected);
                    }
                    self.stats.bytes_read(n);
                    trace!(client = %self.handle.peer(), bytes = n, "Read data");
                }
                Some(line) = self.outbound.recv() => {
                    self.write_line(&line).await?;
                }
            }
        }
    }

    /// Takes the next complete line out of the buffer.
    ///
    /// Undecodable lines are logged and skipped; only an over-long line ends
    /// the connection.
    fn try_next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        loop {
            match self.parser.next_line(&mut self.buffer) {
                Ok(line) => return Ok(line),
                Err(e) if e.is_fatal() => {
                    warn!(client = %self.handle.peer(), error = %e, "Closing connection");
                    return Err(ConnectionError::Parse(e));
                }
                Err(e) => {
                    warn!(client = %self.handle.peer(), error = %e, "Malformed input");
                }
            }
        }
    }

    /// Writes one line and flushes it.
    async fn write_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        self.stats.bytes_written(line.len() + 1);
        trace!(client = %self.handle.peer(), line = %line, "Sent line");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line the connection cannot recover from
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Peer closed its end of the stream
    #[error("Client disconnected")]
    ClientDisconnected,
}

/// Handles a connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. Errors never leave this function.
///
/// # Arguments
///
/// * `stream` - The byte stream for this connection
/// * `addr` - The peer's socket address
/// * `dispatcher` - The dispatcher for executing lines
/// * `stats` - Shared connection statistics
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, dispatcher, stats);
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
