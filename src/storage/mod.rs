//! Task Storage Module
//!
//! This module holds everything the broker remembers between lines:
//! queued tasks and the connections waiting for their results.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TaskStore                            │
//! │                     (one Mutex)                             │
//! │  ┌──────────────────────────┐  ┌──────────────────────────┐ │
//! │  │    PriorityQueueSet      │  │      TaskRegistry        │ │
//! │  │  HIGH  ─> [..][..]       │  │  id ─> ConnectionHandle  │ │
//! │  │  MEDIUM─> [..]           │  │  conn ─> {ids}           │ │
//! │  │  LOW   ─> [..][..][..]   │  │                          │ │
//! │  └──────────────────────────┘  └──────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Strict Priority**: every HIGH task leaves before any MEDIUM, every
//!   MEDIUM before any LOW, FIFO within a lane
//! - **Atomic Submission**: ID, queue entry and origin appear together
//! - **Bounded Registry**: a disconnecting client's entries are evicted
//!
//! Nothing here is persisted.

pub mod engine;
pub mod queue;
pub mod registry;

// Re-export commonly used types
pub use engine::{StoreStats, TaskStore};
pub use queue::PriorityQueueSet;
pub use registry::TaskRegistry;
