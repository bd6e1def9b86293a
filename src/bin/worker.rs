//! TaskBroker Worker
//!
//! Connects to a broker, pulls tasks and reports their results.

use std::time::Duration;
use taskbroker::peers::{run_worker, WorkerConfig};
use tracing::info;

/// Worker configuration
struct Config {
    /// Broker host
    host: String,
    /// Broker port
    port: u16,
    /// Worker loop settings
    worker: WorkerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: taskbroker::DEFAULT_HOST.to_string(),
            port: taskbroker::DEFAULT_PORT,
            worker: WorkerConfig::default(),
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
                ("--idle-ms", Some(ms)) => {
                    config.worker.idle_interval =
                        Duration::from_millis(parse_or_exit(ms, "idle interval"))
                }
                ("--max-tasks", Some(n)) => {
                    config.worker.max_tasks = Some(parse_or_exit(n, "task count"))
                }
                ("--help", _) => {
                    print_help();
                    std::process::exit(0);
                }
                ("--version" | "-v", _) => {
                    println!("TaskBroker worker version {}", taskbroker::VERSION);
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
TaskBroker worker

USAGE:
    taskbroker-worker [OPTIONS]

OPTIONS:
    -h, --host <HOST>       Broker host (default: 127.0.0.1)
    -p, --port <PORT>       Broker port (default: 50051)
        --idle-ms <MS>      Wait after NO_TASK before asking again (default: 1000)
        --max-tasks <N>     Exit after N completed tasks
    -v, --version           Print version information
        --help              Print this help message
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();
    taskbroker::init_tracing();

    let completed = run_worker(config.broker_address(), config.worker).await?;
    info!(completed = completed, "Worker finished");
    Ok(())
}
