//! The scheduler: pending queue, admission control and settlement routing.
//!
//! A [`Scheduler`] wraps each submission in a task, inserts it into the pending queue
//! and runs an admission pass on the runtime. A pass starts queued tasks while fewer
//! than `concurrency_limit` attempts are in flight and the dispatch spacing allows.
//! Every settlement releases a slot, routes the outcome to `Done`, `Error` (requeued)
//! or `Fail`, and runs another pass.
//!
//! All scheduling decisions are taken under one `parking_lot::Mutex`, which is never
//! held across an `.await` and never held while events are emitted.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, Notify};

use super::events::{EventHub, EventSink, Progress, SchedulerEvent};
use super::task::{Dispatch, Settlement, Task};
use super::{attempt_fn, Attempt, SchedulerError, TaskDescriptor, TaskHandle, TaskRef};
use crate::builders::SchedulerBuilder;
use crate::config::{RetryPlacement, SchedulerConfig};
use crate::infra::InMemoryQueue;
use crate::util::types::Priority;

/// Abstraction for spawning futures on a runtime.
pub trait Spawn: Send + Sync {
    /// Run `fut` to completion in the background.
    fn spawn(&self, fut: BoxFuture<'static, ()>);
}

/// Anything the pending queue can order.
pub trait Prioritized {
    /// Dispatch priority, higher first.
    fn priority(&self) -> Priority;
}

/// Abstraction for pending queue backends.
pub trait TaskQueue<E: Prioritized> {
    /// Insert after every entry of equal or higher priority.
    fn enqueue(&mut self, entry: E);
    /// Append to the back regardless of priority.
    fn requeue(&mut self, entry: E);
    /// Remove the next entry to dispatch.
    fn dequeue(&mut self) -> Option<E>;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Prioritized for Arc<dyn Dispatch> {
    fn priority(&self) -> Priority {
        Dispatch::priority(self.as_ref())
    }
}

/// Point-in-time counters of a scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Submissions so far, comebacks included.
    pub submitted: u64,
    /// Tasks resolved.
    pub completed: u64,
    /// Tasks rejected after spending their retry budget.
    pub failed: u64,
    /// Failed attempts that were requeued.
    pub retried: u64,
    /// Attempts currently running.
    pub in_flight: usize,
    /// Tasks waiting in the queue.
    pub pending: usize,
}

impl SchedulerStats {
    /// Completion progress.
    #[must_use]
    pub const fn progress(&self) -> Progress {
        Progress {
            completed: self.completed,
            submitted: self.submitted,
        }
    }

    /// Completion percentage, rounded down.
    #[must_use]
    pub const fn percent(&self) -> u64 {
        self.progress().percent()
    }

    /// Whether nothing is queued or in flight.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.pending == 0
    }
}

struct SchedulerState {
    pending: InMemoryQueue<Arc<dyn Dispatch>>,
    in_flight: usize,
    submitted: u64,
    completed: u64,
    failed: u64,
    retried: u64,
    last_dispatch_at: Option<Instant>,
    /// A deferred admission pass is armed.
    admit_armed: bool,
}

impl SchedulerState {
    fn place(&mut self, entry: Arc<dyn Dispatch>, placement: RetryPlacement) {
        match placement {
            RetryPlacement::Tail => self.pending.requeue(entry),
            RetryPlacement::ByPriority => self.pending.enqueue(entry),
        }
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted,
            completed: self.completed,
            failed: self.failed,
            retried: self.retried,
            in_flight: self.in_flight,
            pending: self.pending.len(),
        }
    }
}

struct Inner {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    spawner: Arc<dyn Spawn>,
    events: EventHub,
    http: reqwest::Client,
    next_id: AtomicU64,
    idle: Notify,
}

/// Bounded-concurrency, priority-ordered task scheduler.
///
/// Cheap to clone; clones share the same queue and counters.
///
/// # Example
///
/// ```rust,ignore
/// use fetch_lot::core::{Scheduler, SchedulerError, TaskDescriptor};
/// use fetch_lot::config::SchedulerConfig;
///
/// let scheduler = Scheduler::new(SchedulerConfig::new().with_concurrency_limit(3))?;
/// let handle = scheduler.submit_fn(TaskDescriptor::new("answer").with_priority(5), || async {
///     Ok::<_, SchedulerError>(42)
/// });
/// assert_eq!(handle.await?, 42);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Start building a scheduler.
    #[must_use]
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Scheduler with `config`, the current tokio runtime and no event sinks.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when the configuration does not validate or no
    /// tokio runtime is running.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new().config(config).build()
    }

    pub(crate) fn from_parts(
        config: SchedulerConfig,
        spawner: Arc<dyn Spawn>,
        sinks: Vec<Arc<dyn EventSink>>,
        http: reqwest::Client,
    ) -> Self {
        let events = EventHub::new(sinks, config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SchedulerState {
                    pending: InMemoryQueue::new(),
                    in_flight: 0,
                    submitted: 0,
                    completed: 0,
                    failed: 0,
                    retried: 0,
                    last_dispatch_at: None,
                    admit_armed: false,
                }),
                spawner,
                events,
                http,
                next_id: AtomicU64::new(1),
                idle: Notify::new(),
            }),
        }
    }

    /// Configuration fixed at construction.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Submit a task. Admission runs on the runtime; the returned handle resolves
    /// once the task settles.
    pub fn submit<T, A>(&self, descriptor: TaskDescriptor, attempt: A) -> TaskHandle<T>
    where
        T: Send + 'static,
        A: Attempt<T>,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (task, outcome) = Task::new(id, descriptor, Box::new(attempt));
        let entry: Arc<dyn Dispatch> = task.clone();
        let depth = {
            let mut state = self.inner.state.lock();
            state.submitted += 1;
            state.pending.enqueue(entry);
            state.pending.len()
        };
        tracing::debug!(
            task = %Dispatch::name(task.as_ref()),
            id,
            priority = %Dispatch::priority(task.as_ref()),
            depth,
            "task enqueued"
        );
        self.schedule_admit();
        TaskHandle::new(TaskRef::new(task, self.clone()), outcome)
    }

    /// Submit a closure producing one attempt future per dispatch.
    pub fn submit_fn<T, F, Fut>(&self, descriptor: TaskDescriptor, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, SchedulerError>> + Send + 'static,
    {
        self.submit(descriptor, attempt_fn(f))
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.lock().stats()
    }

    /// Receive every event emitted from now on.
    ///
    /// A receiver that falls more than `event_capacity` events behind observes
    /// `RecvError::Lagged`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// Resolve once nothing is pending or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.stats().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Put a comeback task back into the queue and run admission.
    pub(crate) fn readmit(&self, entry: Arc<dyn Dispatch>) {
        {
            let mut state = self.inner.state.lock();
            state.submitted += 1;
            state.place(entry, self.inner.config.retry_placement);
        }
        self.schedule_admit();
    }

    fn schedule_admit(&self) {
        let this = self.clone();
        self.inner.spawner.spawn(async move { this.admit() }.boxed());
    }

    fn schedule_deferred_admit(&self, wait: Duration) {
        tracing::debug!(?wait, "dispatch spacing not reached, deferring admission");
        let this = self.clone();
        self.inner.spawner.spawn(
            async move {
                tokio::time::sleep(wait).await;
                this.inner.state.lock().admit_armed = false;
                this.admit();
            }
            .boxed(),
        );
    }

    /// One admission pass.
    fn admit(&self) {
        let mut started = Vec::new();
        let mut defer = None;
        {
            let mut state = self.inner.state.lock();
            let limit = self.inner.config.concurrency_limit;
            let interval = self.inner.config.min_dispatch_interval();

            while state.in_flight < limit && !state.pending.is_empty() {
                let now = Instant::now();
                if let Some(last) = state.last_dispatch_at {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed < interval {
                        if !state.admit_armed {
                            state.admit_armed = true;
                            defer = Some(interval - elapsed);
                        }
                        break;
                    }
                }
                let Some(entry) = state.pending.dequeue() else {
                    break;
                };
                state.in_flight += 1;
                state.last_dispatch_at = Some(now);
                started.push(entry);
            }
        }

        if let Some(wait) = defer {
            self.schedule_deferred_admit(wait);
        }

        for entry in started {
            let attempt = entry.attempt_number();
            tracing::debug!(task = %entry.name(), id = entry.id(), attempt, "dispatching");
            self.inner.events.emit(SchedulerEvent::Request {
                id: entry.id(),
                name: entry.name().to_owned(),
                attempt,
            });
            self.inner.spawner.spawn(entry.dispatch(self.clone()));
        }
    }

    /// Route a finished attempt, release its slot and run admission.
    ///
    /// `conclude` hands a terminal outcome to the caller. It runs after the slot is
    /// released and the event is emitted, so a comeback from the caller always follows
    /// the `Done` or `Fail` of the pass it re-runs.
    pub(crate) fn finish(
        &self,
        entry: Arc<dyn Dispatch>,
        settlement: Settlement,
        conclude: impl FnOnce(),
    ) {
        let id = entry.id();
        let name = entry.name().to_owned();
        let (event, idle) = {
            let mut state = self.inner.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            let event = match settlement {
                Settlement::Resolved => {
                    state.completed += 1;
                    SchedulerEvent::Done {
                        id,
                        name,
                        progress: Progress {
                            completed: state.completed,
                            submitted: state.submitted,
                        },
                    }
                }
                Settlement::Retry(error) => {
                    state.retried += 1;
                    state.place(entry, self.inner.config.retry_placement);
                    SchedulerEvent::Error { id, name, error }
                }
                Settlement::Failed(error) => {
                    state.failed += 1;
                    SchedulerEvent::Fail { id, name, error }
                }
            };
            (event, state.stats().is_idle())
        };

        match &event {
            SchedulerEvent::Done { name, progress, .. } => {
                tracing::info!(task = %name, id, percent = progress.percent(), "task resolved");
            }
            SchedulerEvent::Error { name, error, .. } => {
                tracing::warn!(task = %name, id, error = %error, "attempt failed, requeued");
            }
            SchedulerEvent::Fail { name, error, .. } => {
                tracing::info!(task = %name, id, error = %error, "task rejected");
            }
            SchedulerEvent::Request { .. } => {}
        }
        self.inner.events.emit(event);
        conclude();

        if idle {
            self.inner.idle.notify_waiters();
        }
        self.admit();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
