//! Task lifecycle: status, retry accounting and the caller-facing outcome handle.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{Attempt, Scheduler, SchedulerError};
use crate::util::types::{Priority, TaskId};

/// Status of a task in its current lifecycle pass.
///
/// State transitions:
/// - Pending -> Attempting -> Resolved
/// - Pending -> Attempting -> Pending (retryable failure, requeued)
/// - Pending -> Attempting -> Rejected (retry budget spent)
/// - Resolved | Rejected -> Pending (manual `comeback`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the pending queue.
    Pending,
    /// An attempt is in flight.
    Attempting,
    /// Settled with a value.
    Resolved,
    /// Settled with a permanent failure.
    Rejected,
}

impl TaskStatus {
    /// Whether the task is queued or in flight.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Attempting)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Attempting => "attempting",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Caller-supplied description of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Name used in events and logs, usually the resource URL.
    pub name: String,
    /// Dispatch priority, higher first.
    #[serde(default)]
    pub priority: Priority,
}

impl TaskDescriptor {
    /// Descriptor with [`Priority::NORMAL`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: Priority::NORMAL,
        }
    }

    /// Set the dispatch priority.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }
}

type Outcome<T> = Result<T, SchedulerError>;

struct TaskState<T> {
    status: TaskStatus,
    error_count: u32,
    outcome: Option<oneshot::Sender<Outcome<T>>>,
}

/// What one finished attempt means for the scheduler.
#[derive(Debug)]
pub(crate) enum Settlement {
    /// Value delivered to the caller.
    Resolved,
    /// Failed, budget left: requeue.
    Retry(SchedulerError),
    /// Failed, budget spent: error delivered to the caller.
    Failed(SchedulerError),
}

/// A task as owned by the scheduler.
pub(crate) struct Task<T> {
    id: TaskId,
    name: String,
    priority: Priority,
    attempt: Box<dyn Attempt<T>>,
    state: Mutex<TaskState<T>>,
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new(
        id: TaskId,
        descriptor: TaskDescriptor,
        attempt: Box<dyn Attempt<T>>,
    ) -> (Arc<Self>, oneshot::Receiver<Outcome<T>>) {
        let (tx, rx) = oneshot::channel();
        let task = Arc::new(Self {
            id,
            name: descriptor.name,
            priority: descriptor.priority,
            attempt,
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                error_count: 0,
                outcome: Some(tx),
            }),
        });
        (task, rx)
    }

    pub(crate) fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    pub(crate) fn error_count(&self) -> u32 {
        self.state.lock().error_count
    }

    /// Run one attempt raced against `timeout`.
    async fn run_attempt(&self, timeout: Duration) -> Outcome<T> {
        self.state.lock().status = TaskStatus::Attempting;
        tracing::debug!(task = %self.name, id = self.id, "attempt started");

        match tokio::time::timeout(timeout, self.attempt.begin()).await {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = self.attempt.cancel() {
                    tracing::warn!(task = %self.name, error = %e, "cancel after timeout failed");
                }
                Err(SchedulerError::Timeout(timeout))
            }
        }
    }

    /// Apply an attempt result to the retry budget.
    ///
    /// A terminal outcome is handed back instead of delivered; the task stays
    /// `Attempting` until [`Task::conclude`] runs after the scheduler released its slot.
    fn settle(&self, result: Outcome<T>, max_retries: u32) -> (Settlement, Option<Outcome<T>>) {
        let mut state = self.state.lock();
        match result {
            Ok(value) => (Settlement::Resolved, Some(Ok(value))),
            Err(error) => {
                state.error_count += 1;
                if state.error_count > max_retries {
                    (Settlement::Failed(error.clone()), Some(Err(error)))
                } else {
                    state.status = TaskStatus::Pending;
                    (Settlement::Retry(error), None)
                }
            }
        }
    }

    /// Enter the terminal status and hand the outcome to the caller.
    fn conclude(&self, outcome: Outcome<T>) {
        let mut state = self.state.lock();
        state.status = if outcome.is_ok() {
            TaskStatus::Resolved
        } else {
            TaskStatus::Rejected
        };
        self.deliver(&mut state, outcome);
    }

    fn deliver(&self, state: &mut TaskState<T>, outcome: Outcome<T>) {
        match state.outcome.take() {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!(task = %self.name, "outcome receiver dropped");
                }
            }
            None => tracing::debug!(task = %self.name, "outcome already delivered"),
        }
    }

    /// Prepare a settled task for a manual re-run.
    fn reinit(
        &self,
        force_reset: bool,
        max_retries: u32,
    ) -> Result<oneshot::Receiver<Outcome<T>>, SchedulerError> {
        let mut state = self.state.lock();
        if state.status.is_live() {
            return Err(SchedulerError::InvalidState {
                name: self.name.clone(),
                status: state.status,
            });
        }
        if force_reset {
            state.error_count = 0;
        }
        state.error_count += 1;
        if state.error_count > max_retries {
            return Err(SchedulerError::ErrorLimitExceeded {
                name: self.name.clone(),
                errors: state.error_count,
            });
        }
        let (tx, rx) = oneshot::channel();
        state.status = TaskStatus::Pending;
        state.outcome = Some(tx);
        Ok(rx)
    }
}

/// Type-erased view of a task, as stored in the pending queue.
pub(crate) trait Dispatch: Send + Sync {
    fn id(&self) -> TaskId;
    fn name(&self) -> &str;
    fn priority(&self) -> Priority;
    /// 1-based number of the attempt about to start.
    fn attempt_number(&self) -> u32;
    /// Run one attempt and report back to the scheduler.
    fn dispatch(self: Arc<Self>, scheduler: Scheduler) -> BoxFuture<'static, ()>;
}

impl<T: Send + 'static> Dispatch for Task<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn attempt_number(&self) -> u32 {
        self.error_count() + 1
    }

    fn dispatch(self: Arc<Self>, scheduler: Scheduler) -> BoxFuture<'static, ()> {
        async move {
            let timeout = scheduler.config().per_attempt_timeout();
            let max_retries = scheduler.config().max_retries;
            let result = AssertUnwindSafe(self.run_attempt(timeout))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(&*payload);
                    tracing::error!(task = %self.name, id = self.id, %message, "attempt panicked");
                    Err(SchedulerError::attempt(format!("attempt panicked: {message}")))
                });
            let (settlement, terminal) = self.settle(result, max_retries);
            let task = Arc::clone(&self);
            scheduler.finish(self, settlement, move || {
                if let Some(outcome) = terminal {
                    task.conclude(outcome);
                }
            });
        }
        .boxed()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Caller-side reference to a submitted task.
///
/// Cheap to clone; used to inspect the task or to re-run it with
/// [`TaskRef::comeback`].
pub struct TaskRef<T> {
    task: Arc<Task<T>>,
    scheduler: Scheduler,
}

impl<T> Clone for TaskRef<T> {
    fn clone(&self) -> Self {
        Self {
            task: Arc::clone(&self.task),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T: Send + 'static> TaskRef<T> {
    pub(crate) fn new(task: Arc<Task<T>>, scheduler: Scheduler) -> Self {
        Self { task, scheduler }
    }

    /// Scheduler-assigned id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.task.id
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.task.name
    }

    /// Dispatch priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.task.priority
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.task.status()
    }

    /// Cumulative failed attempts, including manual comebacks.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.task.error_count()
    }

    /// Re-run a settled task, e.g. when a "successful" result turned out to be unusable.
    ///
    /// Counts as one more error. With `force_reset` the error count is cleared first.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidState`] while the task is pending or attempting.
    /// - [`SchedulerError::ErrorLimitExceeded`] when the extra error exceeds
    ///   `max_retries`; nothing is requeued.
    pub fn comeback(&self, force_reset: bool) -> Result<TaskHandle<T>, SchedulerError> {
        let outcome = self
            .task
            .reinit(force_reset, self.scheduler.config().max_retries)?;
        tracing::debug!(task = %self.task.name, force_reset, "comeback requested");
        let entry: Arc<dyn Dispatch> = self.task.clone();
        self.scheduler.readmit(entry);
        Ok(TaskHandle::new(self.clone(), outcome))
    }
}

impl<T: Send + 'static> fmt::Debug for TaskRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRef")
            .field("id", &self.task.id)
            .field("name", &self.task.name)
            .field("priority", &self.task.priority)
            .field("status", &self.task.status())
            .finish_non_exhaustive()
    }
}

/// Outcome handle returned at submission.
///
/// Resolves exactly once, with the attempt's value or with the error that made the
/// task fail permanently.
pub struct TaskHandle<T> {
    task: TaskRef<T>,
    outcome: oneshot::Receiver<Outcome<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub(crate) fn new(task: TaskRef<T>, outcome: oneshot::Receiver<Outcome<T>>) -> Self {
        Self { task, outcome }
    }

    /// Reference to the underlying task, usable after the handle is awaited.
    #[must_use]
    pub fn task(&self) -> TaskRef<T> {
        self.task.clone()
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }
}

impl<T: Send + 'static> Future for TaskHandle<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let received = match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(received) => received,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(received.unwrap_or_else(|_| {
            Err(SchedulerError::Abandoned(self.task.name().to_owned()))
        }))
    }
}

impl<T: Send + 'static> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}
