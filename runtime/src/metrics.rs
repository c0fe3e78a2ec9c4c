//! Prometheus metrics for the dispatcher and the broadcast hub.
//!
//! Metrics go through the `metrics` facade and are free when no recorder is
//! installed. The server installs the Prometheus recorder at start-up and
//! renders it on `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use clinic_queue_runtime::metrics::MetricsRecorder;
//!
//! let mut recorder = MetricsRecorder::new();
//! recorder.install().expect("recorder");
//! println!("{}", recorder.render().unwrap_or_default());
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not installed yet
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder globally.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder can only be installed once per process. A second call
    /// logs a warning and leaves this handle empty.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the Prometheus handle
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the recorder was not installed by this handle.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "dispatcher_commands_total",
        "Total number of commands processed by the dispatcher"
    );
    describe_counter!(
        "dispatcher_rejected_commands_total",
        "Commands rejected because the dispatcher is shutting down"
    );
    describe_histogram!(
        "dispatcher_reduce_duration_seconds",
        "Time spent in the reducer per command"
    );

    describe_gauge!("hub_connections", "Currently registered viewer connections");
    describe_counter!("hub_broadcasts_total", "Total number of broadcast events");
    describe_counter!(
        "hub_deliveries_total",
        "Total number of frames handed to connections by broadcasts"
    );
    describe_counter!("hub_replies_total", "Total number of private replies delivered");
    describe_counter!(
        "hub_delivery_failures_total",
        "Deliveries that failed and unregistered their connection"
    );
}

/// Dispatcher metrics recorder.
pub struct DispatcherMetrics;

impl DispatcherMetrics {
    /// Record a processed command.
    pub fn record_command(duration: Duration) {
        counter!("dispatcher_commands_total").increment(1);
        histogram!("dispatcher_reduce_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a command rejected during shutdown.
    pub fn record_rejection() {
        counter!("dispatcher_rejected_commands_total").increment(1);
    }
}

/// Broadcast hub metrics recorder.
pub struct HubMetrics;

impl HubMetrics {
    /// Record the current connection count.
    pub fn record_connections(count: usize) {
        // Note: Precision loss acceptable for gauges (counts < 2^52)
        #[allow(clippy::cast_precision_loss)]
        gauge!("hub_connections").set(count as f64);
    }

    /// Record one broadcast and how many connections received it.
    pub fn record_broadcast(delivered: usize) {
        counter!("hub_broadcasts_total").increment(1);
        counter!("hub_deliveries_total").increment(delivered as u64);
    }

    /// Record a private reply.
    pub fn record_reply() {
        counter!("hub_replies_total").increment(1);
    }

    /// Record a failed delivery.
    pub fn record_delivery_failure() {
        counter!("hub_delivery_failures_total").increment(1);
    }
}
