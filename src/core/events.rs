//! Scheduler notifications and sinks.
//!
//! Every lifecycle step emits a [`SchedulerEvent`]. Events fan out to each registered
//! [`EventSink`] and to every receiver obtained from `Scheduler::subscribe`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use super::SchedulerError;
use crate::util::types::TaskId;

/// Completion progress at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Tasks resolved successfully so far.
    pub completed: u64,
    /// Tasks submitted so far (comebacks included).
    pub submitted: u64,
}

impl Progress {
    /// `completed / submitted`, 0.0 before anything was submitted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.completed as f64 / self.submitted as f64
        }
    }

    /// Whole-number percentage, rounded down.
    #[must_use]
    pub const fn percent(self) -> u64 {
        if self.submitted == 0 {
            0
        } else {
            self.completed * 100 / self.submitted
        }
    }
}

/// Notification emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// An attempt was dispatched.
    Request {
        /// Task id.
        id: TaskId,
        /// Task name.
        name: String,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A task resolved.
    Done {
        /// Task id.
        id: TaskId,
        /// Task name.
        name: String,
        /// Progress after this completion.
        progress: Progress,
    },
    /// An attempt failed and the task was requeued.
    Error {
        /// Task id.
        id: TaskId,
        /// Task name.
        name: String,
        /// Error of the failed attempt.
        #[serde(serialize_with = "display")]
        error: SchedulerError,
    },
    /// A task failed permanently.
    Fail {
        /// Task id.
        id: TaskId,
        /// Task name.
        name: String,
        /// Error of the final attempt.
        #[serde(serialize_with = "display")]
        error: SchedulerError,
    },
}

impl SchedulerEvent {
    /// Name of the task the event is about.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Request { name, .. }
            | Self::Done { name, .. }
            | Self::Error { name, .. }
            | Self::Fail { name, .. } => name,
        }
    }

    /// Short event kind: `request`, `done`, `error` or `fail`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Fail { .. } => "fail",
        }
    }
}

fn display<S: serde::Serializer>(error: &SchedulerError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Observer of scheduler events.
///
/// Called synchronously from the scheduler outside its internal lock; keep it cheap.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &SchedulerEvent);
}

/// Bounded in-memory sink for tests and diagnostics.
#[derive(Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<SchedulerEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink keeping at most `max_events`, oldest dropped first.
    ///
    /// A sink created with `0` stores nothing.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events of one kind (`request`, `done`, `error`, `fail`).
    #[must_use]
    pub fn of_kind(&self, kind: &str) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: &SchedulerEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Sink writing each event as a JSON line through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn record(&self, event: &SchedulerEvent) {
        match serde_json::to_string(event) {
            Ok(line) => tracing::info!(target: "fetch_lot::events", "{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize scheduler event"),
        }
    }
}

/// Fan-out point owned by the scheduler.
pub(crate) struct EventHub {
    sinks: Vec<Arc<dyn EventSink>>,
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventHub {
    pub(crate) fn new(sinks: Vec<Arc<dyn EventSink>>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { sinks, tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SchedulerEvent) {
        for sink in &self.sinks {
            sink.record(&event);
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}
