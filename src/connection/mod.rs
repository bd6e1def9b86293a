//! Connection Module
//!
//! This module manages the broker's network connections.
//! Each connection is handled by its own async task; clients and workers
//! share the same handler because the broker infers what a peer is doing
//! from each line it sends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Supervisor (TcpListener)                   │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │ For each connection... │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read line   │───>│ Dispatch    │───>│ Write reply │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               ▲             │
//! │  ┌─────────────────────────────┐              │             │
//! │  │ Outbound channel (results   │──────────────┘             │
//! │  │ routed from other handlers) │                            │
//! │  └─────────────────────────────┘                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **Line Framing**: BytesMut buffer, partial and pipelined lines
//! - **Result Routing**: Other connections write through a [`ConnectionHandle`]
//! - **Teardown**: pending results of a closed connection are evicted
//! - **Statistics**: Tracks connection and line metrics
//!
//! ## Example
//!
//! ```ignore
//! use taskbroker::connection::{handle_connection, ConnectionStats};
//! use taskbroker::dispatcher::Dispatcher;
//! use taskbroker::storage::TaskStore;
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new(Arc::new(TaskStore::new()));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, dispatcher.clone(), stats));
//! ```

pub mod handle;
pub mod handler;
pub mod supervisor;

// Re-export commonly used types
pub use handle::{ConnectionHandle, ConnectionId, DeliveryError};
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
pub use supervisor::{accept_loop, serve, Supervisor};
