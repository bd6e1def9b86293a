//! Worker Peer
//!
//! A worker connects once, announces itself with `REGISTER_WORKER`, and then
//! keeps pulling work:
//!
//! ```text
//! REQUEST_TASK ──> "<id> <op> <a> <b>" ──> evaluate ──> RESULT <id> <text>
//!      ▲                 │
//!      │                 └── NO_TASK ──> sleep(idle_interval)
//!      └─────────────────────────────────────┘
//! ```
//!
//! The worker stops when the broker closes the connection.

use crate::peers::PeerError;
use crate::protocol::{NO_TASK, REGISTER_WORKER, REQUEST_TASK, RESULT};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

/// Reply for operations the worker cannot evaluate.
pub const INVALID_TASK: &str = "INVALID_TASK";

/// Worker settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause after a `NO_TASK` reply before asking again (default: 1s)
    pub idle_interval: Duration,
    /// Stop after this many completed tasks (default: run forever)
    pub max_tasks: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            max_tasks: None,
        }
    }
}

/// Evaluates one arithmetic task and renders its result text.
///
/// Operands that are not integers count as 0. Only the first two operands
/// are used.
///
/// # Example
/// ```
/// use taskbroker::peers::evaluate;
/// assert_eq!(evaluate("Multiply", &["3", "7"]), "3 * 7 = 21");
/// assert_eq!(evaluate("Sqrt", &["9", "0"]), "INVALID_TASK");
/// ```
pub fn evaluate<S: AsRef<str>>(operation: &str, operands: &[S]) -> String {
    let (x, y) = match operands {
        [a, b, ..] => (to_int(a.as_ref()), to_int(b.as_ref())),
        _ => return INVALID_TASK.to_string(),
    };

    let (symbol, value) = match operation {
        "Add" => ("+", Some(x.wrapping_add(y))),
        "Minus" => ("-", Some(x.wrapping_sub(y))),
        "Multiply" => ("*", Some(x.wrapping_mul(y))),
        "Subtract" => ("/", x.checked_div(y)),
        "Power" => ("^", Some(power(x, y))),
        "Mod" => ("%", x.checked_rem(y)),
        _ => return INVALID_TASK.to_string(),
    };

    match value {
        Some(value) => format!("{} {} {} = {}", x, symbol, y, value),
        None => INVALID_TASK.to_string(),
    }
}

fn to_int(s: &str) -> i64 {
    s.parse().unwrap_or(0)
}

/// `base ^ exp` with wrapping overflow; negative exponents give 1.
fn power(base: i64, exp: i64) -> i64 {
    if exp <= 0 {
        return 1;
    }
    match u32::try_from(exp) {
        Ok(exp) => base.wrapping_pow(exp),
        Err(_) => match base {
            0 => 0,
            1 => 1,
            -1 if exp % 2 == 0 => 1,
            -1 => -1,
            _ => base.wrapping_pow(u32::MAX),
        },
    }
}

/// Connects to the broker at `addr` and processes tasks until the broker
/// hangs up or `config.max_tasks` is reached.
///
/// Returns the number of tasks completed.
pub async fn run_worker<A: ToSocketAddrs>(addr: A, config: WorkerConfig) -> Result<usize, PeerError> {
    let stream = TcpStream::connect(addr).await?;
    let peer = stream.peer_addr()?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    info!(broker = %peer, "Worker connected");
    write_half
        .write_all(format!("{}\n", REGISTER_WORKER).as_bytes())
        .await?;

    let mut completed = 0;
    while config.max_tasks.map_or(true, |max| completed < max) {
        debug!("Requesting task");
        write_half
            .write_all(format!("{}\n", REQUEST_TASK).as_bytes())
            .await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => {
                info!(broker = %peer, "Broker closed the connection");
                break;
            }
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let (id, operation, operands) = match fields.as_slice() {
            [id, operation, operands @ ..] if !operands.is_empty() => (*id, *operation, operands),
            _ => {
                if line.trim() != NO_TASK {
                    debug!(line = %line, "Ignoring unexpected reply");
                }
                tokio::time::sleep(config.idle_interval).await;
                continue;
            }
        };

        info!(task_id = %id, "Executing {} {:?}", operation, operands);
        let result = evaluate(operation, operands);
        debug!(task_id = %id, result = %result, "Sending result");

        write_half
            .write_all(format!("{} {} {}\n", RESULT, id, result).as_bytes())
            .await?;
        completed += 1;
    }

    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_operations() {
        assert_eq!(evaluate("Add", &["2", "3"]), "2 + 3 = 5");
        assert_eq!(evaluate("Minus", &["2", "3"]), "2 - 3 = -1");
        assert_eq!(evaluate("Multiply", &["5", "10"]), "5 * 10 = 50");
        assert_eq!(evaluate("Subtract", &["17", "5"]), "17 / 5 = 3");
        assert_eq!(evaluate("Power", &["2", "10"]), "2 ^ 10 = 1024");
        assert_eq!(evaluate("Mod", &["17", "5"]), "17 % 5 = 2");
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(evaluate("Subtract", &["1", "0"]), INVALID_TASK);
        assert_eq!(evaluate("Mod", &["1", "0"]), INVALID_TASK);
    }

    #[test]
    fn test_evaluate_unknown_operation() {
        assert_eq!(evaluate("Divide", &["1", "1"]), INVALID_TASK);
    }

    #[test]
    fn test_evaluate_needs_two_operands() {
        assert_eq!(evaluate("Add", &["1"]), INVALID_TASK);
        assert_eq!(evaluate::<&str>("Add", &[]), INVALID_TASK);
    }

    #[test]
    fn test_evaluate_non_numeric_operands_are_zero() {
        assert_eq!(evaluate("Add", &["x", "4"]), "0 + 4 = 4");
    }

    #[test]
    fn test_evaluate_extra_operands_ignored() {
        assert_eq!(evaluate("Add", &["1", "2", "3"]), "1 + 2 = 3");
    }

    #[test]
    fn test_power_edges() {
        assert_eq!(power(5, 0), 1);
        assert_eq!(power(5, -2), 1);
        assert_eq!(power(-1, 5_000_000_001), -1);
        assert_eq!(power(1, i64::MAX), 1);
        assert_eq!(power(2, 64), 0);
    }
}
