//! Client Peer
//!
//! Submits tasks and waits for their results. Each task gets its own
//! connection, so the first line that comes back is that task's result.

use crate::peers::PeerError;
use crate::protocol::{Priority, UNREGISTER_CLIENT};
use rand::Rng;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

/// Operations the companion worker understands, in generation order.
pub const OPERATIONS: [&str; 6] = ["Add", "Minus", "Multiply", "Subtract", "Power", "Mod"];

/// Priorities in generation order.
const PRIORITIES: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

/// Generates `n` submission lines.
///
/// Operations and priorities cycle in a fixed order; operands are drawn
/// from `0..100`.
///
/// # Example
/// ```
/// use rand::SeedableRng;
/// use taskbroker::peers::generate_tasks;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let tasks = generate_tasks(2, &mut rng);
/// assert!(tasks[0].starts_with("Add "));
/// assert!(tasks[0].ends_with(" LOW"));
/// assert!(tasks[1].starts_with("Minus "));
/// ```
pub fn generate_tasks<R: Rng>(n: usize, rng: &mut R) -> Vec<String> {
    (0..n)
        .map(|i| {
            let a: u32 = rng.gen_range(0..100);
            let b: u32 = rng.gen_range(0..100);
            format!(
                "{} {} {} {}",
                OPERATIONS[i % OPERATIONS.len()],
                a,
                b,
                PRIORITIES[i % PRIORITIES.len()]
            )
        })
        .collect()
}

/// Submits one task line on a fresh connection and waits for its result.
///
/// Returns `Ok(None)` if no result arrived within `timeout` or the broker
/// closed the connection first. `UNREGISTER_CLIENT` is sent either way.
pub async fn submit<A: ToSocketAddrs>(
    addr: A,
    line: &str,
    timeout: Duration,
) -> Result<Option<String>, PeerError> {
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    info!("Sending task: {}", line);
    write_half.write_all(format!("{}\n", line).as_bytes()).await?;

    let result = match tokio::time::timeout(timeout, lines.next_line()).await {
        Ok(Ok(Some(result))) => {
            info!("Received: {}", result.trim());
            Some(result.trim().to_string())
        }
        Ok(Ok(None)) => {
            warn!(task = %line, "Broker closed the connection before replying");
            None
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            warn!(task = %line, timeout_secs = timeout.as_secs_f64(), "Timed out waiting for result");
            None
        }
    };

    if let Err(e) = write_half
        .write_all(format!("{}\n", UNREGISTER_CLIENT).as_bytes())
        .await
    {
        debug!(error = %e, "Could not unregister");
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{parse_line, Message};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_tasks_parse() {
        let mut rng = StdRng::seed_from_u64(42);
        let tasks = generate_tasks(12, &mut rng);
        assert_eq!(tasks.len(), 12);

        for (i, line) in tasks.iter().enumerate() {
            match parse_line(line).unwrap() {
                Message::Submit(spec) => {
                    assert_eq!(spec.operation, OPERATIONS[i % 6]);
                    assert_eq!(spec.priority, PRIORITIES[i % 3]);
                    assert_eq!(spec.operands.len(), 2);
                    for operand in &spec.operands {
                        let n: u32 = operand.parse().unwrap();
                        assert!(n < 100);
                    }
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_generate_zero_tasks() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_tasks(0, &mut rng).is_empty());
    }
}
