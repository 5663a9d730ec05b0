//! Queue item ordering and the queue backend abstraction.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// In-memory reference into the queue. Never persisted.
///
/// Ordered so that the smallest item is the next to launch: lower priority
/// number first, then earlier enqueue time, then insertion sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Priority number at the time of (re)enqueue.
    pub priority: i64,
    /// FIFO key among equal priorities.
    pub enqueued_at: DateTime<Utc>,
    /// Insertion sequence; breaks ties between identical timestamps.
    pub seq: u64,
    /// Referenced task.
    pub task_id: String,
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.enqueued_at.cmp(&other.enqueued_at))
            .then_with(|| self.seq.cmp(&other.seq))
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Abstraction for queue backends.
pub trait TaskQueue: Send {
    /// Add an item.
    fn enqueue(&mut self, item: QueueItem);
    /// Remove the next item to launch.
    fn dequeue(&mut self) -> Option<QueueItem>;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Drop every item.
    fn clear(&mut self);
}
