//! Dispatcher Module
//!
//! This module implements the routing layer of the broker.
//! It receives classified lines, applies them to the task store,
//! and tells the connection handler what to write back.
//!
//! ## Architecture
//!
//! ```text
//! Inbound line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  (this module)
//! │                 │
//! │  - Classify     │
//! │  - Enqueue      │
//! │  - Route        │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   TaskStore     │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the dispatcher
pub use handler::{Dispatcher, Outcome};
