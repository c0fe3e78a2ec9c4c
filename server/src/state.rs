//! Application state for Axum handlers.

use crate::config::{Config, ConfigError};
use clinic_queue::{QueueEnvironment, QueueReducer, QueueStore};
use clinic_queue_runtime::metrics::MetricsRecorder;
use clinic_queue_runtime::{Dispatcher, DispatcherConfig};
use std::sync::Arc;

/// The queue dispatcher as used by the server
pub type QueueDispatcher = Dispatcher<QueueReducer>;

/// Application state shared across all HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    /// Serialized entry point for every queue command
    pub dispatcher: QueueDispatcher,
    /// Installed Prometheus recorder, when metrics are enabled
    pub metrics: Option<Arc<MetricsRecorder>>,
}

impl AppState {
    /// Wrap an existing dispatcher
    #[must_use]
    pub const fn new(dispatcher: QueueDispatcher) -> Self {
        Self {
            dispatcher,
            metrics: None,
        }
    }

    /// Build the dispatcher described by the configuration.
    ///
    /// Seeds the queue with the configured roster and uses the system
    /// clock and random ids.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the roster cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let doctors = config.load_roster()?;
        tracing::info!(
            doctors = doctors.len(),
            transitions = ?config.transitions,
            "Queue seeded"
        );

        let store = QueueStore::new(doctors).with_policy(config.transitions);
        let dispatcher = Dispatcher::with_config(
            store,
            QueueReducer::new(),
            QueueEnvironment::production(),
            DispatcherConfig::default().with_connection_buffer(config.connection_buffer),
        );
        Ok(Self::new(dispatcher))
    }

    /// Attach an installed metrics recorder
    #[must_use]
    pub fn with_metrics(mut self, recorder: MetricsRecorder) -> Self {
        self.metrics = Some(Arc::new(recorder));
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
