//! Configuration models for the scheduler.

pub mod scheduler;

pub use scheduler::{RetryPlacement, SchedulerConfig, ENV_PREFIX};
