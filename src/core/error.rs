//! Error types for scheduler operations.

use std::time::Duration;

use thiserror::Error;

use super::TaskStatus;

/// Errors produced by tasks and the scheduler.
///
/// Every variant owns plain data so one error can be handed to the caller and to
/// every event subscriber at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Transport-level failure (connect, DNS, reset, body read).
    #[error("network error: {0}")]
    Network(String),
    /// Attempt exceeded its time budget.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    /// Response arrived with a non-success status.
    #[error("request `{url}` failed with status code {status}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Status code received.
        status: u16,
    },
    /// Payload type does not match what the caller expected.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
    /// Body could not be decoded with the requested encoding.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Reading the response body stream failed.
    #[error("stream error: {0}")]
    Stream(String),
    /// Opening or writing the destination failed.
    #[error("sink error: {0}")]
    Sink(String),
    /// Caller-defined attempt failure.
    #[error("attempt failed: {0}")]
    Attempt(String),
    /// Retry budget of the task is spent.
    #[error("task `{name}` exceeded its error limit ({errors} errors)")]
    ErrorLimitExceeded {
        /// Task name.
        name: String,
        /// Cumulative error count.
        errors: u32,
    },
    /// Operation not allowed in the task's current lifecycle state.
    #[error("task `{name}` is {status}")]
    InvalidState {
        /// Task name.
        name: String,
        /// State the task was in.
        status: TaskStatus,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Outcome slot was dropped before the task settled (runtime shut down).
    #[error("task `{0}` was dropped before it settled")]
    Abandoned(String),
}

impl SchedulerError {
    /// Shorthand for a caller-defined attempt failure.
    pub fn attempt(message: impl Into<String>) -> Self {
        Self::Attempt(message.into())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
