//! TaskBroker Client
//!
//! Generates a batch of tasks, submits each on its own connection and
//! waits for the results.

use std::time::Duration;
use taskbroker::peers::{generate_tasks, submit};
use tracing::{info, warn};

/// Client configuration
struct Config {
    /// Broker host
    host: String,
    /// Broker port
    port: u16,
    /// Number of tasks to generate
    tasks: usize,
    /// Delay between task submissions
    delay: Duration,
    /// How long each submission waits for its result
    timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: taskbroker::DEFAULT_HOST.to_string(),
            port: taskbroker::DEFAULT_PORT,
            tasks: 10,
            delay: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(host)) => config.host = host.clone(),
                ("--port" | "-p", Some(port)) => config.port = parse_or_exit(port, "port"),
                ("--tasks" | "-n", Some(n)) => config.tasks = parse_or_exit(n, "task count"),
                ("--delay", Some(ms)) => {
                    config.delay = Duration::from_millis(parse_or_exit(ms, "delay"))
                }
                ("--timeout", Some(secs)) => {
                    config.timeout = Duration::from_secs(parse_or_exit(secs, "timeout"))
                }
                ("--help", _) => {
                    print_help();
                    std::process::exit(0);
                }
                ("--version" | "-v", _) => {
                    println!("TaskBroker client version {}", taskbroker::VERSION);
                    std::process::exit(0);
                }
                (flag, None) if flag.starts_with('-') => {
                    eprintln!("Error: {} requires a value", flag);
                    std::process::exit(1);
                }
                (other, _) => {
                    eprintln!("Unknown argument: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 2;
        }

        config
    }

    /// Returns the broker address as a string
    fn broker_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or_exit<T: std::str::FromStr>(value: &str, what: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid {}: {}", what, value);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
TaskBroker client

USAGE:
    taskbroker-client [OPTIONS]

OPTIONS:
    -h, --host <HOST>       Broker host (default: 127.0.0.1)
    -p, --port <PORT>       Broker port (default: 50051)
    -n, --tasks <N>         Number of tasks to generate (default: 10)
        --delay <MS>        Delay between submissions (default: 100)
        --timeout <SECS>    Wait for each result (default: 5)
    -v, --version           Print version information
        --help              Print this help message
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();
    taskbroker::init_tracing();

    let tasks = generate_tasks(config.tasks, &mut rand::thread_rng());
    let mut submissions = Vec::with_capacity(tasks.len());

    for task in tasks {
        let addr = config.broker_address();
        let timeout = config.timeout;
        submissions.push(tokio::spawn(async move {
            submit(addr, &task, timeout).await
        }));
        tokio::time::sleep(config.delay).await;
    }

    let mut answered = 0;
    for submission in submissions {
        match submission.await? {
            Ok(Some(_)) => answered += 1,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Submission failed"),
        }
    }

    info!(answered = answered, total = config.tasks, "All tasks completed");
    Ok(())
}
