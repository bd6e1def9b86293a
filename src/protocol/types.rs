//! Broker Wire Types
//!
//! This module defines the values that travel over a broker connection.
//! Every message is a single line of whitespace-separated text terminated
//! by `\n`.
//!
//! ## Protocol Format
//!
//! Client to broker:
//! - `<OPERATION> <operand> [<operand> ...] [<PRIORITY>]` submits a task
//! - `UNREGISTER_CLIENT` closes the connection
//!
//! Worker to broker:
//! - `REGISTER_WORKER` announces the worker
//! - `REQUEST_TASK` pulls one unit of work
//! - `RESULT <id> <text...>` reports a finished task
//!
//! Broker to worker:
//! - `<id> <OPERATION> <operand> ...` assigns a task
//! - `NO_TASK` when every lane is empty
//!
//! Broker to client: the raw result text, one line per finished task.

use std::fmt;

/// Keyword a worker sends once after connecting.
pub const REGISTER_WORKER: &str = "REGISTER_WORKER";

/// Keyword a worker sends to pull a task.
pub const REQUEST_TASK: &str = "REQUEST_TASK";

/// Leading token of a worker's result line.
pub const RESULT: &str = "RESULT";

/// Keyword a client sends to close its connection.
pub const UNREGISTER_CLIENT: &str = "UNREGISTER_CLIENT";

/// Reply to `REQUEST_TASK` when there is nothing queued.
pub const NO_TASK: &str = "NO_TASK";

/// Broker-assigned task identifier. Starts at 1 and is never reused.
pub type TaskId = u64;

/// Priority class of a task.
///
/// Lanes are drained strictly in `High`, `Medium`, `Low` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// All priorities in dequeue precedence order.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Parses a priority tag, ignoring ASCII case.
    ///
    /// # Example
    /// ```
    /// use taskbroker::protocol::Priority;
    /// assert_eq!(Priority::parse("high"), Some(Priority::High));
    /// assert_eq!(Priority::parse("urgent"), None);
    /// ```
    pub fn parse(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("HIGH") {
            Some(Priority::High)
        } else if tag.eq_ignore_ascii_case("MEDIUM") {
            Some(Priority::Medium)
        } else if tag.eq_ignore_ascii_case("LOW") {
            Some(Priority::Low)
        } else {
            None
        }
    }

    /// The upper-case wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    /// Index of this priority's lane (0 is drained first).
    #[inline]
    pub fn lane(&self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted task before the broker has given it an ID.
///
/// Operands are kept as opaque text tokens. Only the worker interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Operation name, e.g. `Multiply`
    pub operation: String,
    /// Operands in submission order (never empty)
    pub operands: Vec<String>,
    /// Lane the task is queued on
    pub priority: Priority,
}

impl TaskSpec {
    pub fn new(
        operation: impl Into<String>,
        operands: Vec<String>,
        priority: Priority,
    ) -> Self {
        Self {
            operation: operation.into(),
            operands,
            priority,
        }
    }
}

/// A queued unit of work.
///
/// A task does not know which connection submitted it; the origin is looked
/// up by `id` in the task registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub spec: TaskSpec,
}

impl Task {
    pub fn new(id: TaskId, spec: TaskSpec) -> Self {
        Self { id, spec }
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.spec.priority
    }

    /// Renders the line sent to a worker: `<id> <operation> <operand> ...`
    ///
    /// # Example
    /// ```
    /// use taskbroker::protocol::{Priority, Task, TaskSpec};
    /// let spec = TaskSpec::new("Multiply", vec!["5".into(), "10".into()], Priority::High);
    /// assert_eq!(Task::new(1, spec).assignment_line(), "1 Multiply 5 10");
    /// ```
    pub fn assignment_line(&self) -> String {
        let mut line = format!("{} {}", self.id, self.spec.operation);
        for operand in &self.spec.operands {
            line.push(' ');
            line.push_str(operand);
        }
        line
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {:?} [{}]",
            self.id, self.spec.operation, self.spec.operands, self.spec.priority
        )
    }
}

/// A classified inbound line.
///
/// The broker keeps no per-connection role; what a connection is allowed to
/// do is decided by the shape of each line alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `REGISTER_WORKER`
    RegisterWorker,
    /// `REQUEST_TASK`
    RequestTask,
    /// `RESULT <id> <text...>`, with `text` rejoined by single spaces
    Result { id: TaskId, text: String },
    /// `UNREGISTER_CLIENT`
    UnregisterClient,
    /// Anything else that parses as a task
    Submit(TaskSpec),
}

impl Message {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RegisterWorker => REGISTER_WORKER,
            Message::RequestTask => REQUEST_TASK,
            Message::Result { .. } => RESULT,
            Message::UnregisterClient => UNREGISTER_CLIENT,
            Message::Submit(_) => "SUBMIT",
        }
    }
}
