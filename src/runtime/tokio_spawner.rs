//! Tokio runtime spawner implementation.

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::core::{SchedulerError, Spawn};

/// Tokio-based spawner that runs scheduler futures on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner bound to the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when called outside a tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::InvalidConfig(format!("no tokio runtime: {e}")))
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        drop(self.handle.spawn(fut));
    }
}
