//! The unit of work a task runs on every dispatch.

use std::future::Future;

use async_trait::async_trait;

use super::SchedulerError;

/// One retryable asynchronous operation.
///
/// The scheduler calls [`Attempt::begin`] once per dispatch and races the returned
/// future against the per-attempt timeout. On timeout the future is dropped, which
/// releases whatever it owned, and [`Attempt::cancel`] is called for anything the
/// future does not own (a detached thread, a remote job).
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use fetch_lot::core::{Attempt, SchedulerError};
///
/// struct Ping {
///     addr: String,
/// }
///
/// #[async_trait]
/// impl Attempt<u128> for Ping {
///     async fn begin(&self) -> Result<u128, SchedulerError> {
///         let started = std::time::Instant::now();
///         tokio::net::TcpStream::connect(&self.addr)
///             .await
///             .map_err(|e| SchedulerError::Network(e.to_string()))?;
///         Ok(started.elapsed().as_millis())
///     }
/// }
/// ```
#[async_trait]
pub trait Attempt<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Start one attempt and resolve with its outcome.
    async fn begin(&self) -> Result<T, SchedulerError>;

    /// Best-effort cancellation after a timeout. Errors are logged and ignored.
    fn cancel(&self) -> Result<(), SchedulerError> {
        Ok(())
    }
}

/// Adapter turning a closure that returns a future into an [`Attempt`].
pub struct FnAttempt<F>(F);

/// Wrap a closure as an [`Attempt`]. The closure is called once per dispatch.
pub fn attempt_fn<F, Fut, T>(f: F) -> FnAttempt<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, SchedulerError>> + Send + 'static,
    T: Send + 'static,
{
    FnAttempt(f)
}

#[async_trait]
impl<F, Fut, T> Attempt<T> for FnAttempt<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, SchedulerError>> + Send + 'static,
    T: Send + 'static,
{
    async fn begin(&self) -> Result<T, SchedulerError> {
        (self.0)().await
    }
}
