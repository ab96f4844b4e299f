//! Infrastructure adapters for the pending queue.

pub mod queue;
pub use queue::InMemoryQueue;
