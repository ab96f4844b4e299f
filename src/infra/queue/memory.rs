//! In-memory pending queue: descending priority, FIFO within a priority.

use std::collections::VecDeque;

use crate::core::{Prioritized, TaskQueue};

/// Pending queue backed by a `VecDeque`.
///
/// `enqueue` places an entry after every entry whose priority is greater than or
/// equal to its own. `requeue` appends to the back, so after tail requeues the
/// deque is no longer sorted; `enqueue` therefore scans from the back instead of
/// binary searching.
pub struct InMemoryQueue<E> {
    entries: VecDeque<E>,
}

impl<E> InMemoryQueue<E> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Create an empty queue with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Iterate entries in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }
}

impl<E> Default for InMemoryQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Prioritized> TaskQueue<E> for InMemoryQueue<E> {
    fn enqueue(&mut self, entry: E) {
        let priority = entry.priority();
        let at = self
            .entries
            .iter()
            .rposition(|e| e.priority() >= priority)
            .map_or(0, |i| i + 1);
        self.entries.insert(at, entry);
    }

    fn requeue(&mut self, entry: E) {
        self.entries.push_back(entry);
    }

    fn dequeue(&mut self) -> Option<E> {
        self.entries.pop_front()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Priority;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Entry(u32, i32);

    impl Prioritized for Entry {
        fn priority(&self) -> Priority {
            Priority(self.1)
        }
    }

    fn drain(q: &mut InMemoryQueue<Entry>) -> Vec<u32> {
        std::iter::from_fn(|| q.dequeue()).map(|e| e.0).collect()
    }

    #[test]
    fn priority_ordering() {
        let mut q = InMemoryQueue::new();
        q.enqueue(Entry(1, 0));
        q.enqueue(Entry(2, 9));
        q.enqueue(Entry(3, 3));
        q.enqueue(Entry(4, -2));
        assert_eq!(drain(&mut q), [2, 3, 1, 4]);
    }

    #[test]
    fn fifo_within_priority() {
        let mut q = InMemoryQueue::new();
        q.enqueue(Entry(1, 5));
        q.enqueue(Entry(2, 5));
        q.enqueue(Entry(3, 7));
        q.enqueue(Entry(4, 5));
        assert_eq!(drain(&mut q), [3, 1, 2, 4]);
    }

    #[test]
    fn requeue_goes_to_tail() {
        let mut q = InMemoryQueue::new();
        q.enqueue(Entry(1, 1));
        q.enqueue(Entry(2, 0));
        q.requeue(Entry(3, 10));
        assert_eq!(q.len(), 3);
        assert_eq!(drain(&mut q), [1, 2, 3]);
    }

    #[test]
    fn enqueue_after_tail_requeue_keeps_higher_entries_first() {
        let mut q = InMemoryQueue::new();
        q.enqueue(Entry(1, 5));
        q.requeue(Entry(2, 0));
        // Goes behind the requeued entry: it sits after an entry of priority >= 0.
        q.enqueue(Entry(3, 0));
        // Goes right after entry 1.
        q.enqueue(Entry(4, 5));
        assert_eq!(drain(&mut q), [1, 4, 2, 3]);
    }

    #[test]
    fn empty_queue() {
        let mut q = InMemoryQueue::<Entry>::default();
        assert!(q.is_empty());
        assert!(q.dequeue().is_none());
    }
}
