//! Tests for the scheduler builder

use fetch_lot::builders::SchedulerBuilder;
use fetch_lot::config::SchedulerConfig;
use fetch_lot::core::{LogEventSink, Scheduler, SchedulerError};
use fetch_lot::runtime::TokioSpawner;

#[tokio::test]
async fn test_builder_defaults() {
    let scheduler = SchedulerBuilder::new().build().expect("default config is valid");
    assert_eq!(scheduler.config(), &SchedulerConfig::default());
    assert!(scheduler.stats().is_idle());
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let err = Scheduler::new(SchedulerConfig::new().with_concurrency_limit(0)).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(msg) if msg.contains("concurrency_limit")));
}

#[test]
fn test_builder_needs_a_runtime() {
    let err = SchedulerBuilder::new().build().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_builder_with_explicit_spawner() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let scheduler = Scheduler::builder()
        .spawner(TokioSpawner::new(runtime.handle().clone()))
        .event_sink(LogEventSink)
        .build()
        .expect("explicit spawner works outside a runtime");

    let handle = scheduler.submit_fn(fetch_lot::core::TaskDescriptor::new("blocking"), || async {
        Ok::<_, SchedulerError>(5)
    });
    assert_eq!(runtime.block_on(handle), Ok(5));
}
