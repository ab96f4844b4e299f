//! # fetch_lot
//!
//! A bounded-concurrency, priority-ordered scheduler for asynchronous network tasks.
//!
//! Callers enqueue many I/O-bound jobs (fetch a page, save an image) and the scheduler
//! enforces a ceiling on simultaneously in-flight attempts, a minimum spacing between
//! dispatches, a per-attempt timeout and a bounded retry budget with eventual
//! permanent failure.
//!
//! ## Core Concepts
//!
//! - **Task**: a name, a priority and an [`Attempt`](core::Attempt), the unit of work run
//!   once per dispatch. Tasks move `Pending -> Attempting -> Resolved | Rejected`, going
//!   back to `Pending` while their retry budget lasts.
//! - **Scheduler**: owns the pending queue (priority descending, FIFO within a
//!   priority), admits tasks while capacity and spacing allow, and routes each
//!   settlement to a `Done`, `Error` or `Fail` event.
//! - **comeback**: a settled task can be re-run through its [`TaskRef`](core::TaskRef),
//!   spending one unit of its retry budget.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fetch_lot::config::SchedulerConfig;
//! use fetch_lot::core::{InMemoryEventSink, Scheduler};
//! use fetch_lot::runtime::{require_image, Destination, FetchOptions, SaveOptions};
//!
//! let events = InMemoryEventSink::new(1024);
//! let scheduler = Scheduler::builder()
//!     .config(
//!         SchedulerConfig::new()
//!             .with_concurrency_limit(4)
//!             .with_max_retries(2)
//!             .with_default_encoding("gbk"),
//!     )
//!     .event_sink(events.clone())
//!     .build()?;
//!
//! let page = scheduler.fetch_text(FetchOptions::new("http://example.com/").with_priority(1));
//! let image = scheduler.save_stream(
//!     SaveOptions::new("http://example.com/a.png", Destination::path("a.png"))
//!         .with_filter(require_image()),
//! );
//!
//! println!("{}", page.await?.body);
//! println!("{} bytes", image.await?.bytes_written);
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - admission, ordering, retry and comeback behavior
//! - `tests/http_test.rs` - the fetch helpers against a local HTTP server

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, attempts, events and the scheduler.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for the pending queue.
pub mod infra;
/// Runtime adapters and the HTTP fetch helpers.
pub mod runtime;
/// Shared utilities.
pub mod util;
