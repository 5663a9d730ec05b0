//! In-memory min-heap queue keyed by (priority, enqueue time).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::{QueueItem, TaskQueue};

/// Wrapper that inverts `QueueItem` ordering so the max-heap pops the smallest item.
#[derive(PartialEq, Eq)]
struct HeapEntry(QueueItem);

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for max-heap: lower priority number and earlier enqueue win.
        other.0.cmp(&self.0)
    }
}

/// In-memory queue storing task references in a binary heap.
/// This provides O(log n) enqueue and O(log n) dequeue operations.
#[derive(Default)]
pub struct InMemoryQueue {
    items: BinaryHeap<HeapEntry>,
}

impl InMemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for InMemoryQueue {
    fn enqueue(&mut self, item: QueueItem) {
        self.items.push(HeapEntry(item));
    }

    fn dequeue(&mut self) -> Option<QueueItem> {
        self.items.pop().map(|entry| entry.0)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}
