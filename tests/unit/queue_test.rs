//! Tests for the in-memory pending queue

use fetch_lot::core::{Prioritized, TaskQueue};
use fetch_lot::infra::InMemoryQueue;
use fetch_lot::util::Priority;

struct Job(&'static str, i32);

impl Prioritized for Job {
    fn priority(&self) -> Priority {
        Priority(self.1)
    }
}

fn names(q: &mut InMemoryQueue<Job>) -> Vec<&'static str> {
    std::iter::from_fn(|| q.dequeue()).map(|j| j.0).collect()
}

#[test]
fn test_stable_descending_insert() {
    let mut q = InMemoryQueue::with_capacity(8);
    q.enqueue(Job("low", -1));
    q.enqueue(Job("high-1", 3));
    q.enqueue(Job("mid", 0));
    q.enqueue(Job("high-2", 3));
    assert_eq!(q.iter().count(), 4);
    assert_eq!(names(&mut q), ["high-1", "high-2", "mid", "low"]);
}

#[test]
fn test_requeue_ignores_priority() {
    let mut q = InMemoryQueue::new();
    q.enqueue(Job("a", 1));
    q.requeue(Job("retry", 100));
    assert_eq!(names(&mut q), ["a", "retry"]);
    assert!(q.is_empty());
}
