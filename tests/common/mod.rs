//! Minimal HTTP/1.1 server for integration tests.
//!
//! Thread per connection, every response carries `Connection: close`. The server
//! tracks hits per path and the highest number of requests it was serving at once.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

/// Parsed request line and raw header block.
pub struct Request {
    pub path: String,
    pub head: String,
}

impl Request {
    /// Value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Canned response.
pub struct Reply {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8".into(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok(format!("status {status}"))
        }
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    max_active: AtomicUsize,
    hits: Mutex<HashMap<String, usize>>,
}

pub struct TestServer {
    base: String,
    counters: Arc<Counters>,
}

impl TestServer {
    /// Start serving `handler` on an ephemeral port. Runs until the process exits.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let counters = Arc::new(Counters::default());
        let handler = Arc::new(handler);

        let accept_counters = Arc::clone(&counters);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let counters = Arc::clone(&accept_counters);
                let handler = Arc::clone(&handler);
                thread::spawn(move || serve(stream, &*handler, &counters));
            }
        });

        Self {
            base: format!("http://127.0.0.1:{port}"),
            counters,
        }
    }

    /// Absolute URL of `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.counters.hits.lock().get(path).copied().unwrap_or(0)
    }

    pub fn max_concurrent(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }
}

fn serve(mut stream: TcpStream, handler: &dyn Fn(&Request) -> Reply, counters: &Counters) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let head = String::from_utf8_lossy(&buf).into_owned();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_owned();
    *counters.hits.lock().entry(path.clone()).or_default() += 1;

    let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
    counters.max_active.fetch_max(active, Ordering::SeqCst);

    let reply = handler(&Request { path, head });
    if !reply.delay.is_zero() {
        thread::sleep(reply.delay);
    }
    // Released before the response is written so the client never observes a
    // finished request that is still counted.
    counters.active.fetch_sub(1, Ordering::SeqCst);

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        reply.content_type,
        reply.body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(&reply.body);
    let _ = stream.flush();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
