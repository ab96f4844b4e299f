//! Tests for event sinks

use fetch_lot::core::{
    EventSink, InMemoryEventSink, LogEventSink, Progress, SchedulerError, SchedulerEvent,
};

fn request(name: &str, attempt: u32) -> SchedulerEvent {
    SchedulerEvent::Request {
        id: 1,
        name: name.to_string(),
        attempt,
    }
}

#[test]
fn test_in_memory_event_sink() {
    let sink = InMemoryEventSink::new(10);
    sink.record(&request("a", 1));
    sink.record(&SchedulerEvent::Error {
        id: 1,
        name: "a".to_string(),
        error: SchedulerError::attempt("x"),
    });
    sink.record(&request("a", 2));

    assert_eq!(sink.events().len(), 3);
    assert_eq!(sink.of_kind("request").len(), 2);
    assert_eq!(sink.of_kind("error")[0].name(), "a");
}

#[test]
fn test_in_memory_event_sink_overflow() {
    let sink = InMemoryEventSink::new(2);
    for attempt in 1..=3 {
        sink.record(&request("a", attempt));
    }
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], request("a", 2));
}

#[test]
fn test_in_memory_event_sink_zero_capacity() {
    let sink = InMemoryEventSink::new(0);
    sink.record(&request("a", 1));
    sink.record(&request("a", 2));
    assert!(sink.events().is_empty());
}

#[test]
fn test_log_event_sink_does_not_panic() {
    fetch_lot::util::init_tracing();
    LogEventSink.record(&SchedulerEvent::Done {
        id: 3,
        name: "b".to_string(),
        progress: Progress {
            completed: 1,
            submitted: 2,
        },
    });
}

#[test]
fn test_event_json_shape() {
    let json = serde_json::to_value(request("c", 2)).unwrap();
    assert_eq!(json["event"], "request");
    assert_eq!(json["name"], "c");
    assert_eq!(json["attempt"], 2);
}
