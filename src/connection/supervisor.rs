//! Connection Supervisor
//!
//! Accepts connections forever and gives each one its own handler task.
//! A failed accept is logged and the loop carries on; a failed connection
//! only ends its own task.

use crate::connection::handler::{handle_connection, ConnectionStats};
use crate::dispatcher::Dispatcher;
use crate::storage::TaskStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Pause after a failed accept, so resource exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Owns the listener and the state shared by every connection.
#[derive(Debug)]
pub struct Supervisor {
    listener: TcpListener,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
}

impl Supervisor {
    /// Creates a supervisor over an already bound listener.
    pub fn new(listener: TcpListener, store: Arc<TaskStore>) -> Self {
        Self {
            listener,
            dispatcher: Dispatcher::new(store),
            stats: Arc::new(ConnectionStats::new()),
        }
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// The shared task store.
    pub fn store(&self) -> Arc<TaskStore> {
        Arc::clone(self.dispatcher.store())
    }

    /// Accepts connections until the task is dropped.
    pub async fn run(self) {
        accept_loop(self.listener, self.dispatcher, self.stats).await
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Connection tasks that are already running are left to finish on
    /// their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
            }
        }
    }
}

/// Main loop that accepts incoming connections.
pub async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let dispatcher = dispatcher.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, dispatcher, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Serves the broker on `listener` until `shutdown` completes.
///
/// # Example
///
/// ```ignore
/// use taskbroker::{serve, TaskStore};
/// use std::sync::Arc;
/// use tokio::net::TcpListener;
///
/// let listener = TcpListener::bind("127.0.0.1:50051").await?;
/// serve(listener, Arc::new(TaskStore::new()), tokio::signal::ctrl_c().map(|_| ())).await;
/// ```
pub async fn serve<F>(listener: TcpListener, store: Arc<TaskStore>, shutdown: F)
where
    F: Future<Output = ()>,
{
    Supervisor::new(listener, store).run_until(shutdown).await
}
