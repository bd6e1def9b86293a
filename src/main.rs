//! TaskBroker - An In-Memory Priority Task Broker
//!
//! This is the main entry point for the broker server.
//! It sets up the TCP listener and the shared task store, then accepts
//! client and worker connections until Ctrl+C.

use std::sync::Arc;
use taskbroker::connection::Supervisor;
use taskbroker::storage::TaskStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: taskbroker::DEFAULT_HOST.to_string(),
            port: taskbroker::DEFAULT_PORT,
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
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("TaskBroker version {}", taskbroker::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
TaskBroker - An In-Memory Priority Task Broker

USAGE:
    taskbroker [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 50051)
    -v, --version        Print version information
        --help           Print this help message

ENVIRONMENT:
    RUST_LOG             Log filter (default: info)

EXAMPLES:
    taskbroker                     # Start on 127.0.0.1:50051
    taskbroker --port 6000         # Start on port 6000
    taskbroker --host 0.0.0.0      # Listen on all interfaces

CONNECTING:
    $ taskbroker-worker &
    $ nc 127.0.0.1 50051
    Multiply 5 10 HIGH
    5 * 10 = 50
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    taskbroker::init_tracing();

    // Create the task store (shared across all connections)
    let store = Arc::new(TaskStore::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        "TaskBroker v{} listening on {}",
        taskbroker::VERSION,
        config.bind_address()
    );

    let supervisor = Supervisor::new(listener, Arc::clone(&store));
    let connections = supervisor.stats();

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    supervisor.run_until(shutdown).await;

    let stats = store.stats();
    info!(
        submitted = stats.submitted,
        dispatched = stats.dispatched,
        routed = stats.routed,
        unmatched = stats.unmatched,
        evicted = stats.evicted,
        queued = stats.queued(),
        connections = connections
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
