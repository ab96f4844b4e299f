//! Tests for error types

use std::time::Duration;

use fetch_lot::core::{SchedulerError, TaskStatus};

#[test]
fn test_http_status_error() {
    let err = SchedulerError::HttpStatus {
        url: "http://a.test/x".to_string(),
        status: 503,
    };
    assert_eq!(
        format!("{err}"),
        "request `http://a.test/x` failed with status code 503"
    );
}

#[test]
fn test_timeout_error() {
    let err = SchedulerError::Timeout(Duration::from_millis(250));
    assert_eq!(format!("{err}"), "attempt timed out after 250ms");
}

#[test]
fn test_error_limit_error() {
    let err = SchedulerError::ErrorLimitExceeded {
        name: "page".to_string(),
        errors: 4,
    };
    assert_eq!(format!("{err}"), "task `page` exceeded its error limit (4 errors)");
}

#[test]
fn test_invalid_state_error() {
    let err = SchedulerError::InvalidState {
        name: "page".to_string(),
        status: TaskStatus::Attempting,
    };
    assert_eq!(format!("{err}"), "task `page` is attempting");
}

#[test]
fn test_errors_are_cloneable() {
    let err = SchedulerError::attempt("boom");
    assert_eq!(err.clone(), err);
    assert_eq!(format!("{err}"), "attempt failed: boom");
}
