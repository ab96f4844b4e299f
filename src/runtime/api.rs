//! Convenience operations submitting HTTP attempts to a scheduler.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use super::http::{FetchAttempt, FetchOptions, SaveOptions, SavedStream, StreamAttempt, TextResponse};
use crate::core::{Scheduler, TaskDescriptor, TaskHandle};
use crate::util::fix_url;

impl Scheduler {
    /// Fetch a text document through the scheduler.
    ///
    /// The task is named after the URL. The body is decoded with the request's encoding,
    /// falling back to the scheduler's `default_encoding`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let page = scheduler
    ///     .fetch_text(FetchOptions::new("http://example.com/").with_priority(2))
    ///     .await?;
    /// println!("{}", page.body);
    /// ```
    pub fn fetch_text(&self, options: FetchOptions) -> TaskHandle<TextResponse> {
        let url = fix_url(&options.url);
        let attempt = FetchAttempt {
            client: self.http().clone(),
            url: url.clone(),
            headers: self.request_headers(options.headers),
            encoding: options
                .encoding
                .or_else(|| self.config().default_encoding.clone()),
        };
        self.submit(TaskDescriptor::new(url).with_priority(options.priority), attempt)
    }

    /// Download a body into a file or a caller-provided sink through the scheduler.
    ///
    /// Resolves once the body is fully written and the sink is flushed and shut down.
    pub fn save_stream(&self, options: SaveOptions) -> TaskHandle<SavedStream> {
        let url = fix_url(&options.src);
        let attempt = StreamAttempt {
            client: self.http().clone(),
            url: url.clone(),
            headers: self.request_headers(options.headers),
            destination: options.destination,
            filter: options.filter,
            on_chunk: options.on_chunk,
        };
        self.submit(TaskDescriptor::new(url).with_priority(options.priority), attempt)
    }

    /// Caller headers plus the configured `User-Agent` unless one was given.
    fn request_headers(&self, mut headers: HeaderMap) -> HeaderMap {
        if !headers.contains_key(USER_AGENT) {
            match HeaderValue::from_str(&self.config().user_agent) {
                Ok(value) => {
                    headers.insert(USER_AGENT, value);
                }
                Err(e) => tracing::warn!(error = %e, "configured user agent is not a valid header"),
            }
        }
        headers
    }
}
