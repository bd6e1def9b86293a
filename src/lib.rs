//! # TaskBroker - An In-Memory Priority Task Broker
//!
//! TaskBroker accepts arithmetic tasks from clients over TCP, hands them to
//! pull-based workers in strict priority order, and routes every result back
//! to the exact connection that submitted the task.
//!
//! ## Features
//!
//! - **Line Protocol**: One whitespace-separated command per `\n`-terminated line
//! - **Priority Lanes**: HIGH, MEDIUM and LOW FIFO lanes with strict precedence
//! - **Pull Dispatch**: Workers ask for work; an empty queue answers `NO_TASK`
//! - **Result Routing**: Task IDs correlate results with their submitter
//! - **Async I/O**: Built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             TaskBroker                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ Supervisor  │───>│ Connection  │───>│ Dispatcher  │                  │
//! │  │ (Listener)  │    │  Handler    │    │             │                  │
//! │  └─────────────┘    └──────▲──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                  routed    │                  ▼                         │
//! │                  results   │   ┌──────────────────────────────────────┐ │
//! │  ┌─────────────┐           │   │              TaskStore               │ │
//! │  │    Line     │           │   │  ┌──────────────────┐ ┌───────────┐  │ │
//! │  │   Parser    │           └───│  │ PriorityQueueSet │ │ Registry  │  │ │
//! │  │             │               │  │ HIGH/MEDIUM/LOW  │ │ id -> conn│  │ │
//! │  └─────────────┘               │  └──────────────────┘ └───────────┘  │ │
//! │                                └──────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use taskbroker::connection::Supervisor;
//! use taskbroker::storage::TaskStore;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:50051").await.unwrap();
//!     let supervisor = Supervisor::new(listener, Arc::new(TaskStore::new()));
//!     supervisor.run().await;
//! }
//! ```
//!
//! ## Protocol
//!
//! ### Client
//! - `<OPERATION> <operand> [<operand> ...] [HIGH|MEDIUM|LOW]` - submit a task
//! - `UNREGISTER_CLIENT` - close the connection
//!
//! ### Worker
//! - `REGISTER_WORKER` - announce the worker
//! - `REQUEST_TASK` - answered with `<id> <OPERATION> <operand> ...` or `NO_TASK`
//! - `RESULT <id> <text...>` - `<text...>` is written to the submitting client
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, message classification and wire types
//! - [`storage`]: priority lanes, task registry and the shared task store
//! - [`dispatcher`]: the protocol state machine
//! - [`connection`]: connection handles, handler loop and accept loop
//! - [`peers`]: companion client and worker
//!
//! ## Design Highlights
//!
//! ### One Consistency Boundary
//!
//! The queue and the registry sit behind a single mutex. A submission
//! assigns its ID, queues the task and records its origin in one critical
//! section, so a worker can never receive a task whose submitter is unknown.
//! No I/O happens while the lock is held.
//!
//! ### Sockets Never Leave Their Task
//!
//! Results are routed through each connection's outbound channel; only the
//! connection's own handler writes to its socket.
//!
//! ### Bounded Registry
//!
//! When a connection closes, every result it was still waiting for is
//! evicted. A late RESULT for such a task is logged and discarded.
//!
//! ### Known Limitation
//!
//! A task handed to a worker that then disconnects is lost; there is no
//! requeue.

pub mod connection;
pub mod dispatcher;
pub mod peers;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use connection::{handle_connection, serve, ConnectionHandle, ConnectionStats, Supervisor};
pub use dispatcher::{Dispatcher, Outcome};
pub use protocol::{parse_line, Message, ParseError, Priority, Task, TaskSpec};
pub use storage::{StoreStats, TaskStore};

/// The default port the broker listens on
pub const DEFAULT_PORT: u16 = 50051;

/// The default host the broker binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TaskBroker
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs the `tracing` subscriber shared by all binaries.
///
/// The level defaults to `info` and can be overridden with `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
