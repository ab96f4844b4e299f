//! Tests for utility functions

use fetch_lot::core::TaskDescriptor;
use fetch_lot::util::encoding::{decode, is_binary};
use fetch_lot::util::{fix_url, Priority, TaskId};

#[test]
fn test_priority_ordering() {
    assert!(Priority(10) > Priority(2));
    assert!(Priority::NORMAL > Priority(-5));
    assert_eq!(Priority::from(4).value(), 4);
}

#[test]
fn test_task_descriptor() {
    let descriptor = TaskDescriptor::new("http://a.test/").with_priority(7);
    assert_eq!(descriptor.name, "http://a.test/");
    assert_eq!(descriptor.priority, Priority(7));
    assert_eq!(TaskDescriptor::new("x").priority, Priority::NORMAL);
}

#[test]
fn test_fix_url() {
    assert_eq!(fix_url("http://a.test/ü"), "http://a.test/%C3%BC");
}

#[test]
fn test_decode_latin1() {
    let decoded = decode(&[0x63, 0x61, 0x66, 0xe9], Some("latin1"));
    assert_eq!(decoded.text, "café");
    assert!(decoded.error.is_none());
}

#[test]
fn test_binary_sniffing() {
    assert!(is_binary(Some("video/mp4"), b""));
    assert!(!is_binary(Some("application/json"), b"{}"));
}

#[test]
fn test_task_id() {
    let id: TaskId = 12345;
    assert_eq!(id, 12345);
}
