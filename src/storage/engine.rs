//! Task Store
//!
//! The broker's only shared mutable state: the [`PriorityQueueSet`] and the
//! [`TaskRegistry`], kept together behind one mutex.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  TaskStore                   │
//! │  ┌────────────────────────────────────────┐  │
//! │  │           Mutex<StoreInner>            │  │
//! │  │  ┌──────────────────┐ ┌─────────────┐  │  │
//! │  │  │ PriorityQueueSet │ │TaskRegistry │  │  │
//! │  │  └──────────────────┘ └─────────────┘  │  │
//! │  └────────────────────────────────────────┘  │
//! │  AtomicU64 counters (submitted, dispatched…) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A submission assigns the ID, queues the task and records its origin in
//! one critical section, so no worker can dequeue a task whose origin is not
//! yet known. Critical sections never perform I/O: routing a result only
//! takes the origin handle out, and the caller delivers after the lock is
//! released.

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::protocol::{Priority, Task, TaskId, TaskSpec};
use crate::storage::queue::PriorityQueueSet;
use crate::storage::registry::TaskRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Queue and registry, mutated together.
#[derive(Debug, Default)]
struct StoreInner {
    queues: PriorityQueueSet,
    registry: TaskRegistry,
}

/// Thread-safe home of every queued task and pending result.
///
/// Wrap it in an `Arc` and share it across connection handlers.
///
/// # Example
///
/// ```
/// use taskbroker::connection::ConnectionHandle;
/// use taskbroker::protocol::{Priority, TaskSpec};
/// use taskbroker::storage::TaskStore;
///
/// let store = TaskStore::new();
/// let (client, _outbound) = ConnectionHandle::channel("127.0.0.1:9000".parse().unwrap());
///
/// let spec = TaskSpec::new("Multiply", vec!["5".into(), "10".into()], Priority::High);
/// let task = store.submit(spec, client);
///
/// assert_eq!(store.dequeue_next(), Some(task));
/// assert!(store.dequeue_next().is_none());
/// ```
pub struct TaskStore {
    inner: Mutex<StoreInner>,

    /// Statistics: tasks accepted
    submitted: AtomicU64,

    /// Statistics: tasks handed to workers
    dispatched: AtomicU64,

    /// Statistics: results matched to a waiting connection
    routed: AtomicU64,

    /// Statistics: results with no waiting connection
    unmatched: AtomicU64,

    /// Statistics: pending entries evicted on disconnect
    evicted: AtomicU64,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("TaskStore")
            .field("queued", &stats.queued())
            .field("pending", &stats.pending)
            .field("submitted", &stats.submitted)
            .field("dispatched", &stats.dispatched)
            .finish()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            submitted: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            routed: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Acquires the store lock.
    ///
    /// Every critical section leaves the queue and registry consistent before
    /// it can panic, so a poisoned lock is still safe to reuse.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accepts a task: assigns its ID, queues it and records `origin` as the
    /// connection awaiting its result.
    ///
    /// Returns the queued task.
    pub fn submit(&self, spec: TaskSpec, origin: ConnectionHandle) -> Task {
        let task = {
            let mut inner = self.lock();
            let id = inner.registry.next_id();
            let task = Task::new(id, spec);
            inner.queues.enqueue(task.clone());
            inner.registry.record_origin(id, origin);
            task
        };

        self.submitted.fetch_add(1, Ordering::Relaxed);
        task
    }

    /// Takes the next task in priority order, or `None` if nothing is queued.
    pub fn dequeue_next(&self) -> Option<Task> {
        let task = self.lock().queues.dequeue_next();
        if task.is_some() {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
        }
        task
    }

    /// Removes and returns the connection waiting for `id`.
    pub fn take_origin(&self, id: TaskId) -> Option<ConnectionHandle> {
        let origin = self.lock().registry.take_origin(id);
        match origin {
            Some(_) => self.routed.fetch_add(1, Ordering::Relaxed),
            None => self.unmatched.fetch_add(1, Ordering::Relaxed),
        };
        origin
    }

    /// Evicts the pending entry for `id`, if any.
    pub fn drop_origin(&self, id: TaskId) -> bool {
        let dropped = self.lock().registry.drop_origin(id);
        if dropped {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        dropped
    }

    /// Evicts every pending entry whose origin is `connection`.
    ///
    /// Called once when a connection is torn down. Tasks stay queued; their
    /// results are discarded when they arrive.
    pub fn evict_connection(&self, connection: ConnectionId) -> usize {
        let evicted = self.lock().registry.drop_connection(connection);
        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted
    }

    /// Total number of queued tasks.
    pub fn queued(&self) -> usize {
        self.lock().queues.len()
    }

    /// Number of tasks still waiting for a result to be routed.
    pub fn pending(&self) -> usize {
        self.lock().registry.pending()
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        let (high, medium, low, pending, last_id) = {
            let inner = self.lock();
            (
                inner.queues.lane_len(Priority::High),
                inner.queues.lane_len(Priority::Medium),
                inner.queues.lane_len(Priority::Low),
                inner.registry.pending(),
                inner.registry.last_id(),
            )
        };

        StoreStats {
            queued_high: high,
            queued_medium: medium,
            queued_low: low,
            pending,
            last_task_id: last_id,
            submitted: self.submitted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

/// Broker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Tasks waiting in the HIGH lane
    pub queued_high: usize,
    /// Tasks waiting in the MEDIUM lane
    pub queued_medium: usize,
    /// Tasks waiting in the LOW lane
    pub queued_low: usize,
    /// Tasks whose result has not been routed yet
    pub pending: usize,
    /// Highest task ID issued
    pub last_task_id: TaskId,
    /// Total tasks accepted
    pub submitted: u64,
    /// Total tasks handed to workers
    pub dispatched: u64,
    /// Total results matched to a waiting connection
    pub routed: u64,
    /// Total results with no waiting connection
    pub unmatched: u64,
    /// Total pending entries evicted on disconnect
    pub evicted: u64,
}

impl StoreStats {
    /// Tasks waiting across all lanes.
    pub fn queued(&self) -> usize {
        self.queued_high + self.queued_medium + self.queued_low
    }
}
