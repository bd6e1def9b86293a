//! Priority Queue Set
//!
//! Three FIFO lanes, one per [`Priority`]. Tasks are appended at the tail of
//! their lane and always taken from the head of the highest-priority lane
//! that has work:
//!
//! ```text
//!   HIGH   ─> [t4] [t7]          ← drained first
//!   MEDIUM ─> [t1] [t2] [t5]
//!   LOW    ─> [t3]               ← only when HIGH and MEDIUM are empty
//! ```
//!
//! This type is not synchronized on its own; [`TaskStore`](super::TaskStore)
//! owns it behind the broker's single lock.

use crate::protocol::{Priority, Task};
use std::collections::VecDeque;

/// Unbounded lanes of queued tasks.
#[derive(Debug, Default)]
pub struct PriorityQueueSet {
    lanes: [VecDeque<Task>; 3],
}

impl PriorityQueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task to the tail of its priority lane.
    pub fn enqueue(&mut self, task: Task) {
        self.lanes[task.priority().lane()].push_back(task);
    }

    /// Removes the head of the highest-priority non-empty lane.
    ///
    /// Returns `None` when every lane is empty.
    pub fn dequeue_next(&mut self) -> Option<Task> {
        self.lanes.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Number of tasks waiting in one lane.
    pub fn lane_len(&self, priority: Priority) -> usize {
        self.lanes[priority.lane()].len()
    }

    /// Total number of queued tasks.
    pub fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TaskSpec;

    fn task(id: u64, priority: Priority) -> Task {
        Task::new(id, TaskSpec::new("Add", vec![id.to_string()], priority))
    }

    fn drain(queue: &mut PriorityQueueSet) -> Vec<u64> {
        std::iter::from_fn(|| queue.dequeue_next())
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = PriorityQueueSet::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_fifo_within_lane() {
        let mut queue = PriorityQueueSet::new();
        for id in 1..=5 {
            queue.enqueue(task(id, Priority::Medium));
        }
        assert_eq!(drain(&mut queue), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_mixed_priority_order() {
        let mut queue = PriorityQueueSet::new();
        queue.enqueue(task(1, Priority::Low));
        queue.enqueue(task(2, Priority::High));
        queue.enqueue(task(3, Priority::Medium));

        assert_eq!(drain(&mut queue), vec![2, 3, 1]);
    }

    #[test]
    fn test_strict_precedence_with_interleaving() {
        let mut queue = PriorityQueueSet::new();
        let priorities = [
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Low,
            Priority::High,
            Priority::Medium,
            Priority::Low,
            Priority::High,
        ];
        for (i, priority) in priorities.iter().enumerate() {
            queue.enqueue(task(i as u64 + 1, *priority));
        }

        assert_eq!(queue.lane_len(Priority::High), 3);
        assert_eq!(queue.lane_len(Priority::Medium), 2);
        assert_eq!(queue.lane_len(Priority::Low), 3);
        assert_eq!(queue.len(), 8);

        // HIGH: 3,5,8  MEDIUM: 2,6  LOW: 1,4,7
        assert_eq!(drain(&mut queue), vec![3, 5, 8, 2, 6, 1, 4, 7]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_after_partial_drain() {
        let mut queue = PriorityQueueSet::new();
        queue.enqueue(task(1, Priority::Low));
        queue.enqueue(task(2, Priority::Medium));

        assert_eq!(queue.dequeue_next().map(|t| t.id), Some(2));

        // A late HIGH task still jumps ahead of the waiting LOW one
        queue.enqueue(task(3, Priority::High));
        assert_eq!(drain(&mut queue), vec![3, 1]);
    }
}
