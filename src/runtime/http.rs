//! HTTP attempts used by the fetch helpers.
//!
//! Both attempts issue a GET per dispatch. A non-200 status fails the attempt, so it
//! goes through the scheduler's retry policy like any other failure.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::core::{Attempt, SchedulerError};
use crate::util::encoding;
use crate::util::types::Priority;

/// Writable destination produced for one download attempt.
pub type BoxSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Lazily opens a fresh sink for every attempt.
pub type SinkFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<BoxSink, SchedulerError>> + Send + Sync>;

/// Inspects a response before its body is consumed. An error fails the attempt.
pub type ResponseFilter = Arc<dyn Fn(&ResponseHead) -> Result<(), SchedulerError> + Send + Sync>;

/// Called with the size of every chunk written.
pub type ChunkCallback = Arc<dyn Fn(usize) + Send + Sync>;

fn network(e: &reqwest::Error) -> SchedulerError {
    SchedulerError::Network(e.to_string())
}

/// Options of [`Scheduler::fetch_text`](crate::core::Scheduler::fetch_text).
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Resource URL. Non-ASCII characters are percent-encoded before sending.
    pub url: String,
    /// Dispatch priority.
    pub priority: Priority,
    /// Charset label overriding the scheduler's `default_encoding`.
    pub encoding: Option<String>,
    /// Extra request headers.
    pub headers: HeaderMap,
}

impl FetchOptions {
    /// Options for `url` with normal priority.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority: Priority::NORMAL,
            encoding: None,
            headers: HeaderMap::new(),
        }
    }

    /// Set the dispatch priority.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Decode the body with `label` instead of the default encoding.
    #[must_use]
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A fetched text document.
#[derive(Debug, Clone)]
pub struct TextResponse {
    /// HTTP status (always 200).
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded body, or lossy UTF-8 of `raw` when decoding failed.
    pub body: String,
    /// Undecoded body bytes.
    pub raw: Vec<u8>,
    /// Decoding failure, if any. Never fails the fetch.
    pub encoding_error: Option<SchedulerError>,
}

/// Status line and headers of a download, handed to a [`ResponseFilter`].
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// `Content-Type` header, if present and valid ASCII.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Filter rejecting any response whose `Content-Type` is not `image/*`.
#[must_use]
pub fn require_image() -> ResponseFilter {
    Arc::new(|head: &ResponseHead| {
        let content_type = head.content_type().unwrap_or_default();
        if content_type.trim().to_ascii_lowercase().starts_with("image/") {
            Ok(())
        } else {
            Err(SchedulerError::InvalidContentType(format!(
                "expected image/*, got `{content_type}` from {}",
                head.url
            )))
        }
    })
}

/// Where a download is written.
#[derive(Clone)]
pub enum Destination {
    /// File created (or truncated) at the start of every attempt.
    Path(PathBuf),
    /// Sink provider called once per attempt.
    Factory(SinkFactory),
}

impl Destination {
    /// Destination writing to a file.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Destination opening a sink through `f` on every attempt.
    pub fn factory<F, Fut, W>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<W, SchedulerError>> + Send + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::Factory(Arc::new(
            move || -> BoxFuture<'static, Result<BoxSink, SchedulerError>> {
                f().map(|sink| sink.map(|w| Box::new(w) as BoxSink)).boxed()
            },
        ))
    }

    async fn open(&self) -> Result<BoxSink, SchedulerError> {
        match self {
            Self::Path(path) => {
                let file = tokio::fs::File::create(path).await.map_err(|e| {
                    SchedulerError::Sink(format!("cannot create {}: {e}", path.display()))
                })?;
                Ok(Box::new(file))
            }
            Self::Factory(factory) => factory().await,
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Options of [`Scheduler::save_stream`](crate::core::Scheduler::save_stream).
#[derive(Clone)]
pub struct SaveOptions {
    /// Resource URL. Non-ASCII characters are percent-encoded before sending.
    pub src: String,
    /// Dispatch priority.
    pub priority: Priority,
    /// Where the body goes.
    pub destination: Destination,
    /// Optional check run on the response head before writing.
    pub filter: Option<ResponseFilter>,
    /// Optional progress callback.
    pub on_chunk: Option<ChunkCallback>,
    /// Extra request headers.
    pub headers: HeaderMap,
}

impl SaveOptions {
    /// Options downloading `src` into `destination`.
    pub fn new(src: impl Into<String>, destination: Destination) -> Self {
        Self {
            src: src.into(),
            priority: Priority::NORMAL,
            destination,
            filter: None,
            on_chunk: None,
            headers: HeaderMap::new(),
        }
    }

    /// Set the dispatch priority.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Reject responses the filter refuses.
    #[must_use]
    pub fn with_filter(mut self, filter: ResponseFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Report every written chunk size to `callback`.
    #[must_use]
    pub fn on_chunk(mut self, callback: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_chunk = Some(Arc::new(callback));
        self
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl fmt::Debug for SaveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveOptions")
            .field("src", &self.src)
            .field("priority", &self.priority)
            .field("destination", &self.destination)
            .field("filter", &self.filter.is_some())
            .field("on_chunk", &self.on_chunk.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of a finished download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SavedStream {
    /// HTTP status (always 200).
    pub status: u16,
    /// Body bytes written to the destination.
    pub bytes_written: u64,
}

/// Attempt fetching a text document.
pub(crate) struct FetchAttempt {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) encoding: Option<String>,
}

#[async_trait]
impl Attempt<TextResponse> for FetchAttempt {
    async fn begin(&self) -> Result<TextResponse, SchedulerError> {
        let response = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| network(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SchedulerError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let raw = response.bytes().await.map_err(|e| network(&e))?.to_vec();

        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        if encoding::is_binary(content_type, &raw) {
            return Err(SchedulerError::InvalidContentType(format!(
                "binary payload ({}) at {}",
                content_type.unwrap_or("no content type"),
                self.url
            )));
        }

        let decoded = encoding::decode(&raw, self.encoding.as_deref());
        if let Some(error) = &decoded.error {
            tracing::warn!(url = %self.url, error = %error, "decoding failed, using lossy utf-8");
        }

        Ok(TextResponse {
            status: status.as_u16(),
            headers,
            body: decoded.text,
            raw,
            encoding_error: decoded.error,
        })
    }
}

/// Attempt streaming a body into a destination.
pub(crate) struct StreamAttempt {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) destination: Destination,
    pub(crate) filter: Option<ResponseFilter>,
    pub(crate) on_chunk: Option<ChunkCallback>,
}

#[async_trait]
impl Attempt<SavedStream> for StreamAttempt {
    async fn begin(&self) -> Result<SavedStream, SchedulerError> {
        let response = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| network(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SchedulerError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        if let Some(filter) = &self.filter {
            let head = ResponseHead {
                url: response.url().to_string(),
                status: status.as_u16(),
                headers: response.headers().clone(),
            };
            filter(&head)?;
        }

        let mut sink = self.destination.open().await?;
        let mut stream = response.bytes_stream();
        let mut bytes_written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SchedulerError::Stream(e.to_string()))?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| SchedulerError::Sink(e.to_string()))?;
            bytes_written += chunk.len() as u64;
            if let Some(callback) = &self.on_chunk {
                callback(chunk.len());
            }
        }

        sink.flush()
            .await
            .map_err(|e| SchedulerError::Sink(e.to_string()))?;
        sink.shutdown()
            .await
            .map_err(|e| SchedulerError::Sink(e.to_string()))?;

        tracing::debug!(url = %self.url, bytes_written, "download finished");
        Ok(SavedStream {
            status: status.as_u16(),
            bytes_written,
        })
    }
}
