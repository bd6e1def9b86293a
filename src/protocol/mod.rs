//! Broker Line Protocol
//!
//! This module implements the text protocol spoken between the broker,
//! its clients and its workers.
//!
//! ## Overview
//!
//! Every message is one line of whitespace-separated fields ending in `\n`.
//! The broker never negotiates a role for a connection: each line is
//! classified on its own into one of five [`Message`] kinds.
//!
//! ## Modules
//!
//! - `types`: `Message`, `Task`, `Priority` and the protocol keywords
//! - `parser`: line framing and classification
//!
//! ## Example
//!
//! ```
//! use taskbroker::protocol::{parse_line, Message};
//!
//! assert_eq!(parse_line("REQUEST_TASK").unwrap(), Message::RequestTask);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_line, LineParser, ParseError, ParseResult, MAX_LINE_LENGTH};
pub use types::{
    Message, Priority, Task, TaskId, TaskSpec, NO_TASK, REGISTER_WORKER, REQUEST_TASK, RESULT,
    UNREGISTER_CLIENT,
};
