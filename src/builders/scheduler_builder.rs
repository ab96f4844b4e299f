//! Builder assembling a scheduler from configuration, a spawner and event sinks.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{EventSink, Scheduler, SchedulerError, Spawn};
use crate::runtime::TokioSpawner;

/// Fluent builder for [`Scheduler`].
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    spawner: Option<Arc<dyn Spawn>>,
    sinks: Vec<Arc<dyn EventSink>>,
    http: Option<reqwest::Client>,
}

impl SchedulerBuilder {
    /// Builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run scheduler futures through `spawner` instead of the current tokio runtime.
    #[must_use]
    pub fn spawner(mut self, spawner: impl Spawn + 'static) -> Self {
        self.spawner = Some(Arc::new(spawner));
        self
    }

    /// Register an event sink. Sinks are called in registration order.
    #[must_use]
    pub fn event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Use a preconfigured HTTP client for the fetch helpers.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Validate the configuration and build the scheduler.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when validation fails, the HTTP client cannot
    /// be built, or no spawner was given and no tokio runtime is running.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config
            .validate()
            .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;

        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => Arc::new(TokioSpawner::current()?),
        };

        let http = match self.http {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(self.config.user_agent.clone())
                .build()
                .map_err(|e| SchedulerError::InvalidConfig(format!("http client: {e}")))?,
        };

        tracing::debug!(
            concurrency_limit = self.config.concurrency_limit,
            max_retries = self.config.max_retries,
            sinks = self.sinks.len(),
            "scheduler built"
        );
        Ok(Scheduler::from_parts(self.config, spawner, self.sinks, http))
    }
}
