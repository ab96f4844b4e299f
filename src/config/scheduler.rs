//! Scheduler configuration structures.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;
use crate::util::encoding;

/// Prefix of environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "FETCH_LOT_";

/// Where a task goes back into the pending queue after a failed attempt or a comeback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPlacement {
    /// Appended to the back of the queue regardless of priority.
    #[default]
    Tail,
    /// Reinserted by priority, after every task of equal or higher priority.
    ByPriority,
}

impl FromStr for RetryPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tail" => Ok(Self::Tail),
            "by_priority" | "priority" => Ok(Self::ByPriority),
            other => Err(format!("unknown retry placement `{other}`")),
        }
    }
}

/// Scheduler configuration. Every field is optional in serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum attempts in flight at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Time budget of a single attempt, in milliseconds.
    #[serde(default = "default_per_attempt_timeout_ms")]
    pub per_attempt_timeout_ms: u64,
    /// Failed attempts tolerated before a task is rejected.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Minimum spacing between two dispatch starts, in milliseconds.
    #[serde(default)]
    pub min_dispatch_interval_ms: u64,
    /// Charset label used to decode fetched text. `None` keeps raw bytes as lossy UTF-8.
    #[serde(default)]
    pub default_encoding: Option<String>,
    /// Requeue placement of retried tasks.
    #[serde(default)]
    pub retry_placement: RetryPlacement,
    /// `User-Agent` sent with every HTTP request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Buffer size of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_per_attempt_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("fetch_lot/", env!("CARGO_PKG_VERSION")).to_owned()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            per_attempt_timeout_ms: default_per_attempt_timeout_ms(),
            max_retries: default_max_retries(),
            min_dispatch_interval_ms: 0,
            default_encoding: None,
            retry_placement: RetryPlacement::Tail,
            user_agent: default_user_agent(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency ceiling.
    #[must_use]
    pub const fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the minimum spacing between dispatch starts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_min_dispatch_interval(mut self, interval: Duration) -> Self {
        self.min_dispatch_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the default charset label for fetched text.
    #[must_use]
    pub fn with_default_encoding(mut self, label: impl Into<String>) -> Self {
        self.default_encoding = Some(label.into());
        self
    }

    /// Set the requeue placement of retried tasks.
    #[must_use]
    pub const fn with_retry_placement(mut self, placement: RetryPlacement) -> Self {
        self.retry_placement = placement;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the event channel buffer size.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Per-attempt timeout as a `Duration`.
    #[must_use]
    pub const fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.per_attempt_timeout_ms)
    }

    /// Dispatch spacing as a `Duration`.
    #[must_use]
    pub const fn min_dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.min_dispatch_interval_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency_limit == 0 {
            return Err("concurrency_limit must be greater than 0".into());
        }
        if self.per_attempt_timeout_ms == 0 {
            return Err("per_attempt_timeout_ms must be greater than 0".into());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".into());
        }
        if reqwest::header::HeaderValue::from_str(&self.user_agent).is_err() {
            return Err("user_agent is not a valid header value".into());
        }
        if let Some(label) = &self.default_encoding {
            if encoding::lookup(label).is_none() {
                return Err(format!("default_encoding `{label}` is not a known charset"));
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `FETCH_LOT_*` environment variables, after reading a
    /// `.env` file if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails when a variable cannot be parsed or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e).context("failed to read .env file");
            }
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup, keyed by full variable name
    /// (`FETCH_LOT_CONCURRENCY_LIMIT`, ...).
    ///
    /// # Errors
    ///
    /// Fails when a value cannot be parsed or the result does not validate.
    pub fn from_vars<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = var("CONCURRENCY_LIMIT") {
            cfg.concurrency_limit = v
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}CONCURRENCY_LIMIT `{v}`"))?;
        }
        if let Some(v) = var("TIMEOUT_MS") {
            cfg.per_attempt_timeout_ms = v
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}TIMEOUT_MS `{v}`"))?;
        }
        if let Some(v) = var("MAX_RETRIES") {
            cfg.max_retries = v
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}MAX_RETRIES `{v}`"))?;
        }
        if let Some(v) = var("MIN_DISPATCH_INTERVAL_MS") {
            cfg.min_dispatch_interval_ms = v
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}MIN_DISPATCH_INTERVAL_MS `{v}`"))?;
        }
        if let Some(v) = var("DEFAULT_ENCODING") {
            let v = v.trim();
            cfg.default_encoding = (!v.is_empty()).then(|| v.to_owned());
        }
        if let Some(v) = var("RETRY_PLACEMENT") {
            cfg.retry_placement = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = var("USER_AGENT") {
            cfg.user_agent = v;
        }
        if let Some(v) = var("EVENT_CAPACITY") {
            cfg.event_capacity = v
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}EVENT_CAPACITY `{v}`"))?;
        }

        cfg.validate().map_err(anyhow::Error::msg)?;
        tracing::debug!(?cfg, "loaded scheduler config from environment");
        Ok(cfg)
    }
}
