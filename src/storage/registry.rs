//! Task Registry
//!
//! Assigns task IDs and remembers which connection must receive each task's
//! result. Entries are removed when the result is routed
//! ([`take_origin`](TaskRegistry::take_origin)) or when the origin connection
//! is torn down ([`drop_connection`](TaskRegistry::drop_connection)).
//!
//! A second index from connection to its outstanding task IDs keeps teardown
//! proportional to that connection's own tasks.

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::protocol::TaskId;
use std::collections::{HashMap, HashSet};

/// Pending-result bookkeeping for every outstanding task.
#[derive(Debug)]
pub struct TaskRegistry {
    /// Last ID handed out (0 = none yet)
    last_id: TaskId,
    /// Task ID -> connection awaiting its result
    origins: HashMap<TaskId, ConnectionHandle>,
    /// Connection -> task IDs it is waiting on
    by_connection: HashMap<ConnectionId, HashSet<TaskId>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            last_id: 0,
            origins: HashMap::new(),
            by_connection: HashMap::new(),
        }
    }

    /// Returns a fresh task ID. IDs start at 1 and are never reused.
    pub fn next_id(&mut self) -> TaskId {
        self.last_id += 1;
        self.last_id
    }

    /// Records the connection that must receive the result of `id`.
    pub fn record_origin(&mut self, id: TaskId, origin: ConnectionHandle) {
        let connection = origin.id();
        if let Some(previous) = self.origins.insert(id, origin) {
            // IDs are unique, so this only happens on caller misuse
            self.unindex(id, previous.id());
        }
        self.by_connection.entry(connection).or_default().insert(id);
    }

    /// Removes and returns the origin of `id`.
    ///
    /// Returns `None` for unknown IDs, duplicate results, and tasks whose
    /// client has already disconnected.
    pub fn take_origin(&mut self, id: TaskId) -> Option<ConnectionHandle> {
        let origin = self.origins.remove(&id)?;
        self.unindex(id, origin.id());
        Some(origin)
    }

    /// Evicts a single entry without routing anything to it.
    ///
    /// Returns true if an entry was removed.
    pub fn drop_origin(&mut self, id: TaskId) -> bool {
        self.take_origin(id).is_some()
    }

    /// Evicts every entry whose origin is `connection`.
    ///
    /// Returns the number of entries removed.
    pub fn drop_connection(&mut self, connection: ConnectionId) -> usize {
        let ids = match self.by_connection.remove(&connection) {
            Some(ids) => ids,
            None => return 0,
        };

        for id in &ids {
            self.origins.remove(id);
        }
        ids.len()
    }

    /// Number of tasks still waiting for a result.
    pub fn pending(&self) -> usize {
        self.origins.len()
    }

    /// Number of tasks a connection is still waiting on.
    pub fn pending_for(&self, connection: ConnectionId) -> usize {
        self.by_connection
            .get(&connection)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// The highest ID issued so far.
    pub fn last_id(&self) -> TaskId {
        self.last_id
    }

    fn unindex(&mut self, id: TaskId, connection: ConnectionId) {
        if let Some(ids) = self.by_connection.get_mut(&connection) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_connection.remove(&connection);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::test_handle;

    #[test]
    fn test_ids_are_monotonic() {
        let mut registry = TaskRegistry::new();
        let ids: Vec<TaskId> = (0..5).map(|_| registry.next_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(registry.last_id(), 5);
    }

    #[test]
    fn test_ids_not_reused_after_take() {
        let (client, _rx) = test_handle();
        let mut registry = TaskRegistry::new();

        let first = registry.next_id();
        registry.record_origin(first, client);
        assert!(registry.take_origin(first).is_some());

        assert_eq!(registry.next_id(), first + 1);
    }

    #[test]
    fn test_take_origin_consumes_entry() {
        let (client, _rx) = test_handle();
        let mut registry = TaskRegistry::new();

        let id = registry.next_id();
        registry.record_origin(id, client.clone());
        assert_eq!(registry.pending(), 1);

        let origin = registry.take_origin(id).unwrap();
        assert_eq!(origin.id(), client.id());
        assert_eq!(registry.pending(), 0);

        // A duplicate result finds nothing
        assert!(registry.take_origin(id).is_none());
    }

    #[test]
    fn test_take_unknown_id() {
        let mut registry = TaskRegistry::new();
        assert!(registry.take_origin(42).is_none());
    }

    #[test]
    fn test_drop_origin() {
        let (client, _rx) = test_handle();
        let mut registry = TaskRegistry::new();

        let id = registry.next_id();
        registry.record_origin(id, client.clone());

        assert!(registry.drop_origin(id));
        assert!(!registry.drop_origin(id));
        assert_eq!(registry.pending_for(client.id()), 0);
    }

    #[test]
    fn test_drop_connection_evicts_only_that_connection() {
        let (a, _rx_a) = test_handle();
        let (b, _rx_b) = test_handle();
        let mut registry = TaskRegistry::new();

        for _ in 0..3 {
            let id = registry.next_id();
            registry.record_origin(id, a.clone());
        }
        let kept = registry.next_id();
        registry.record_origin(kept, b.clone());

        assert_eq!(registry.pending_for(a.id()), 3);
        assert_eq!(registry.drop_connection(a.id()), 3);
        assert_eq!(registry.pending(), 1);
        assert_eq!(registry.pending_for(a.id()), 0);

        // Evicting twice is harmless
        assert_eq!(registry.drop_connection(a.id()), 0);

        assert_eq!(registry.take_origin(kept).unwrap().id(), b.id());
        assert!(registry.by_connection.is_empty());
    }

    #[test]
    fn test_result_after_eviction_is_missing() {
        let (client, _rx) = test_handle();
        let mut registry = TaskRegistry::new();

        let id = registry.next_id();
        registry.record_origin(id, client.clone());
        registry.drop_connection(client.id());

        assert!(registry.take_origin(id).is_none());
    }
}
