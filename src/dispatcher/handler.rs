//! Dispatcher
//!
//! The broker's protocol state machine. Each inbound line is classified into
//! a [`Message`] and executed against the shared [`TaskStore`]:
//!
//! | Message            | Store operation                | Reply to caller        |
//! |--------------------|--------------------------------|------------------------|
//! | `REGISTER_WORKER`  | none                           | none                   |
//! | `REQUEST_TASK`     | `dequeue_next`                 | `<id> <op> <args>` or `NO_TASK` |
//! | `RESULT id text`   | `take_origin(id)`              | none (text goes to origin) |
//! | `UNREGISTER_CLIENT`| none (eviction on teardown)    | connection closes      |
//! | submission         | `submit` (ID + enqueue + origin) | none                 |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                           │
//! │                                                             │
//! │  ┌──────────────┐    ┌─────────────┐    ┌──────────────┐    │
//! │  │ parse_line() │───>│  execute()  │───>│   Outcome    │    │
//! │  └──────────────┘    └──────┬──────┘    └──────────────┘    │
//! │                             │                               │
//! │                             ▼                               │
//! │                         TaskStore                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::connection::ConnectionHandle;
use crate::protocol::{parse_line, Message, TaskId, TaskSpec, NO_TASK};
use crate::storage::TaskStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the calling connection should do after a line is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write this line back to the calling connection
    Reply(String),
    /// Nothing to write
    Silent,
    /// Close the calling connection
    Close,
}

/// Executes protocol messages against the shared task store.
///
/// Cloning is cheap; every connection handler holds its own clone.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    /// The shared queue and registry
    store: Arc<TaskStore>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given store.
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// The store this dispatcher mutates.
    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Classifies and executes one raw line from `caller`.
    ///
    /// Malformed lines are logged and produce [`Outcome::Silent`].
    pub fn handle_line(&self, line: &str, caller: &ConnectionHandle) -> Outcome {
        match parse_line(line) {
            Ok(message) => self.execute(message, caller),
            Err(e) => {
                warn!(client = %caller.peer(), line = %line, error = %e, "Malformed input");
                Outcome::Silent
            }
        }
    }

    /// Executes a classified message from `caller`.
    pub fn execute(&self, message: Message, caller: &ConnectionHandle) -> Outcome {
        match message {
            Message::RegisterWorker => {
                info!(client = %caller.peer(), "Worker registered");
                Outcome::Silent
            }
            Message::RequestTask => self.request_task(caller),
            Message::Result { id, text } => {
                self.route_result(id, text, caller);
                Outcome::Silent
            }
            Message::UnregisterClient => {
                info!(client = %caller.peer(), "Client unregistered");
                Outcome::Close
            }
            Message::Submit(spec) => {
                self.submit(spec, caller);
                Outcome::Silent
            }
        }
    }

    /// Releases everything the store still holds for a closing connection.
    ///
    /// Returns the number of evicted pending entries.
    pub fn release(&self, connection: &ConnectionHandle) -> usize {
        let evicted = self.store.evict_connection(connection.id());
        if evicted > 0 {
            debug!(
                client = %connection.peer(),
                evicted = evicted,
                "Evicted pending results of closed connection"
            );
        }
        evicted
    }

    // ========================================================================
    // Message handlers
    // ========================================================================

    fn request_task(&self, caller: &ConnectionHandle) -> Outcome {
        match self.store.dequeue_next() {
            Some(task) => {
                let line = task.assignment_line();
                info!(
                    worker = %caller.peer(),
                    task_id = task.id,
                    priority = %task.priority(),
                    "Assigned {}",
                    line
                );
                Outcome::Reply(line)
            }
            None => Outcome::Reply(NO_TASK.to_string()),
        }
    }

    fn route_result(&self, id: TaskId, text: String, worker: &ConnectionHandle) {
        let origin = match self.store.take_origin(id) {
            Some(origin) => origin,
            None => {
                warn!(worker = %worker.peer(), task_id = id, "No client waiting for task result");
                return;
            }
        };

        // The store lock is released; the client's own handler writes the line
        match origin.deliver(text) {
            Ok(()) => {
                info!(
                    task_id = id,
                    worker = %worker.peer(),
                    client = %origin.peer(),
                    "Result queued for client"
                );
            }
            Err(e) => {
                warn!(task_id = id, error = %e, "Result discarded");
            }
        }
    }

    fn submit(&self, spec: TaskSpec, caller: &ConnectionHandle) {
        let task = self.store.submit(spec, caller.clone());
        info!(
            client = %caller.peer(),
            task_id = task.id,
            priority = %task.priority(),
            "Task added: {} {:?}",
            task.spec.operation,
            task.spec.operands
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::test_handle;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(TaskStore::new()))
    }

    #[test]
    fn test_register_worker_is_silent() {
        let d = dispatcher();
        let (worker, _rx) = test_handle();
        assert_eq!(d.handle_line("REGISTER_WORKER", &worker), Outcome::Silent);
        assert_eq!(d.store().queued(), 0);
    }

    #[test]
    fn test_request_on_empty_queue() {
        let d = dispatcher();
        let (worker, _rx) = test_handle();
        assert_eq!(
            d.handle_line("REQUEST_TASK", &worker),
            Outcome::Reply("NO_TASK".to_string())
        );
    }

    #[test]
    fn test_round_trip() {
        let d = dispatcher();
        let (client, mut client_rx) = test_handle();
        let (worker, mut worker_rx) = test_handle();

        assert_eq!(d.handle_line("Multiply 5 10 HIGH", &client), Outcome::Silent);
        assert_eq!(
            d.handle_line("REQUEST_TASK", &worker),
            Outcome::Reply("1 Multiply 5 10".to_string())
        );
        assert_eq!(
            d.handle_line("RESULT 1 5 * 10 = 50", &worker),
            Outcome::Silent
        );

        assert_eq!(client_rx.try_recv().unwrap(), "5 * 10 = 50");
        assert!(worker_rx.try_recv().is_err());
        assert_eq!(d.store().pending(), 0);
    }

    #[test]
    fn test_submission_sends_no_reply() {
        let d = dispatcher();
        let (client, mut client_rx) = test_handle();

        assert_eq!(d.handle_line("Add 1 2", &client), Outcome::Silent);
        assert!(client_rx.try_recv().is_err());
        assert_eq!(d.store().queued(), 1);
    }

    #[test]
    fn test_mixed_priorities_dispatch_in_order() {
        let d = dispatcher();
        let (client, _client_rx) = test_handle();
        let (worker, _worker_rx) = test_handle();

        d.handle_line("Add 1 1 LOW", &client);
        d.handle_line("Add 2 2 HIGH", &client);
        d.handle_line("Add 3 3 MEDIUM", &client);

        let replies: Vec<Outcome> = (0..4)
            .map(|_| d.handle_line("REQUEST_TASK", &worker))
            .collect();
        assert_eq!(
            replies,
            vec![
                Outcome::Reply("2 Add 2 2".to_string()),
                Outcome::Reply("3 Add 3 3".to_string()),
                Outcome::Reply("1 Add 1 1".to_string()),
                Outcome::Reply("NO_TASK".to_string()),
            ]
        );
    }

    #[test]
    fn test_result_for_unknown_task_is_discarded() {
        let d = dispatcher();
        let (client, mut client_rx) = test_handle();
        let (worker, mut worker_rx) = test_handle();

        d.handle_line("Add 1 1", &client);
        assert_eq!(
            d.handle_line("RESULT 77 1 + 1 = 2", &worker),
            Outcome::Silent
        );

        assert!(client_rx.try_recv().is_err());
        assert!(worker_rx.try_recv().is_err());
        assert_eq!(d.store().pending(), 1);
    }

    #[test]
    fn test_duplicate_result_is_discarded() {
        let d = dispatcher();
        let (client, mut client_rx) = test_handle();
        let (worker, _worker_rx) = test_handle();

        d.handle_line("Add 1 1", &client);
        d.handle_line("REQUEST_TASK", &worker);
        d.handle_line("RESULT 1 1 + 1 = 2", &worker);
        d.handle_line("RESULT 1 1 + 1 = 2", &worker);

        assert_eq!(client_rx.try_recv().unwrap(), "1 + 1 = 2");
        assert!(client_rx.try_recv().is_err());
    }

    #[test]
    fn test_result_after_client_release() {
        let d = dispatcher();
        let (client, client_rx) = test_handle();
        let (worker, _worker_rx) = test_handle();

        d.handle_line("Power 2 8 LOW", &client);
        drop(client_rx);
        assert_eq!(d.release(&client), 1);

        assert_eq!(
            d.handle_line("REQUEST_TASK", &worker),
            Outcome::Reply("1 Power 2 8".to_string())
        );
        assert_eq!(
            d.handle_line("RESULT 1 2 ^ 8 = 256", &worker),
            Outcome::Silent
        );
        assert_eq!(d.store().stats().unmatched, 1);
    }

    #[test]
    fn test_result_to_closed_connection_is_discarded() {
        let d = dispatcher();
        let (client, client_rx) = test_handle();
        let (worker, _worker_rx) = test_handle();

        d.handle_line("Add 1 1", &client);
        d.handle_line("REQUEST_TASK", &worker);

        // Receiver gone but entry not evicted yet: delivery fails quietly
        drop(client_rx);
        assert_eq!(
            d.handle_line("RESULT 1 1 + 1 = 2", &worker),
            Outcome::Silent
        );
        assert_eq!(d.store().pending(), 0);
    }

    #[test]
    fn test_unregister_closes() {
        let d = dispatcher();
        let (client, _rx) = test_handle();
        assert_eq!(d.handle_line("UNREGISTER_CLIENT", &client), Outcome::Close);
    }

    #[test]
    fn test_malformed_lines_are_silent() {
        let d = dispatcher();
        let (conn, mut rx) = test_handle();

        for line in ["Add", "", "RESULT 1", "RESULT x done"] {
            assert_eq!(d.handle_line(line, &conn), Outcome::Silent);
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(d.store().queued(), 0);
        assert_eq!(d.store().stats().last_task_id, 0);
    }

    #[test]
    fn test_results_route_to_their_own_client() {
        let d = dispatcher();
        let (alice, mut alice_rx) = test_handle();
        let (bob, mut bob_rx) = test_handle();
        let (worker, _worker_rx) = test_handle();

        d.handle_line("Add 1 1", &alice);
        d.handle_line("Add 2 2", &bob);
        d.handle_line("RESULT 2 2 + 2 = 4", &worker);
        d.handle_line("RESULT 1 1 + 1 = 2", &worker);

        assert_eq!(alice_rx.try_recv().unwrap(), "1 + 1 = 2");
        assert_eq!(bob_rx.try_recv().unwrap(), "2 + 2 = 4");
    }
}
