//! Tests for configuration validation

use std::time::Duration;

use fetch_lot::config::{RetryPlacement, SchedulerConfig};

#[test]
fn test_config_validation() {
    let valid = SchedulerConfig::new()
        .with_concurrency_limit(3)
        .with_per_attempt_timeout(Duration::from_secs(5))
        .with_default_encoding("gbk");
    assert!(valid.validate().is_ok());
}

#[test]
fn test_config_invalid_concurrency_limit() {
    let invalid = SchedulerConfig::new().with_concurrency_limit(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_timeout() {
    let invalid = SchedulerConfig::new().with_per_attempt_timeout(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_unknown_encoding() {
    let invalid = SchedulerConfig::new().with_default_encoding("klingon-8");
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("klingon-8"));
}

#[test]
fn test_config_invalid_user_agent() {
    let invalid = SchedulerConfig::new().with_user_agent("bad\nagent");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "concurrency_limit": 3,
        "per_attempt_timeout_ms": 1500,
        "max_retries": 4,
        "min_dispatch_interval_ms": 500,
        "default_encoding": "gbk",
        "retry_placement": "by_priority"
    }"#;

    let config = SchedulerConfig::from_json_str(json).expect("valid json");
    assert_eq!(config.concurrency_limit, 3);
    assert_eq!(config.per_attempt_timeout(), Duration::from_millis(1500));
    assert_eq!(config.max_retries, 4);
    assert_eq!(config.min_dispatch_interval(), Duration::from_millis(500));
    assert_eq!(config.retry_placement, RetryPlacement::ByPriority);
    assert_eq!(config.event_capacity, 256);
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"concurrency_limit": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_retry_placement_parse() {
    assert_eq!("tail".parse::<RetryPlacement>(), Ok(RetryPlacement::Tail));
    assert_eq!(" By_Priority ".parse::<RetryPlacement>(), Ok(RetryPlacement::ByPriority));
    assert!("middle".parse::<RetryPlacement>().is_err());
}

#[test]
fn test_config_from_vars_validates() {
    let result = SchedulerConfig::from_vars(|key| {
        (key == "FETCH_LOT_CONCURRENCY_LIMIT").then(|| "0".to_owned())
    });
    assert!(result.is_err());
}
