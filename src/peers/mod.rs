//! Companion Peers
//!
//! Minimal client and worker programs that speak the broker protocol.
//! They back the `taskbroker-client` and `taskbroker-worker` binaries and
//! the end-to-end tests; the broker itself does not depend on them.
//!
//! - `worker`: pulls tasks and evaluates the arithmetic operations
//! - `client`: generates and submits tasks, waits for results

pub mod client;
pub mod worker;

pub use client::{generate_tasks, submit, OPERATIONS};
pub use worker::{evaluate, run_worker, WorkerConfig, INVALID_TASK};

/// Errors a peer can hit while talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
