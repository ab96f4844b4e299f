//! Core scheduling abstractions: tasks, attempts, events and the scheduler.

pub mod attempt;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod task;

pub use attempt::{attempt_fn, Attempt, FnAttempt};
pub use error::{AppResult, SchedulerError};
pub use events::{EventSink, InMemoryEventSink, LogEventSink, Progress, SchedulerEvent};
pub use scheduler::{Prioritized, Scheduler, SchedulerStats, Spawn, TaskQueue};
pub use task::{TaskDescriptor, TaskHandle, TaskRef, TaskStatus};
