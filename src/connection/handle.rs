//! Connection Handles
//!
//! A [`ConnectionHandle`] is how the rest of the broker refers to a live
//! connection. The socket itself never leaves its handler task; the handle
//! carries the connection's identity and the sending half of its outbound
//! line channel. Whoever holds a handle can queue a line for that
//! connection, and the owning handler writes it to the socket.
//!
//! ```text
//!  Dispatcher (any task)                  Handler task (owns socket)
//!  ─────────────────────                  ──────────────────────────
//!  handle.deliver(line) ──mpsc──────────> outbound.recv() ──> write_line()
//! ```
//!
//! Once the handler stops, its receiver is closed and every later
//! `deliver` fails with [`DeliveryError::Closed`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Process-unique identifier of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Allocates the next connection ID.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The connection that delivered a line went away before it could be written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Cloneable reference to one live connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    outbound: UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, peer: SocketAddr, outbound: UnboundedSender<String>) -> Self {
        Self { id, peer, outbound }
    }

    /// Creates a handle and the receiver its handler drains.
    pub fn channel(peer: SocketAddr) -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(ConnectionId::next(), peer, tx), rx)
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues one line (without its terminator) for this connection.
    ///
    /// Never blocks.
    pub fn deliver(&self, line: impl Into<String>) -> Result<(), DeliveryError> {
        self.outbound
            .send(line.into())
            .map_err(|_| DeliveryError::Closed(self.id))
    }

    /// Returns true once the owning handler has stopped reading.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_handle() -> (ConnectionHandle, UnboundedReceiver<String>) {
    ConnectionHandle::channel(SocketAddr::from(([127, 0, 0, 1], 0)))
}
