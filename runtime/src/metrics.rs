//! Prometheus metrics for the booking service.
//!
//! Covers the store (reducer and effect execution), the event journal, and
//! the live notification hub.
//!
//! # Example
//!
//! ```rust,no_run
//! use busline_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://0.0.0.0:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a metrics server that will listen on `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Install the global recorder and start the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed is tolerated with a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install() {
            Ok(()) => {
                self.started = true;
                tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
                Ok(())
            },
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            },
        }
    }

    /// Whether this instance installed the recorder.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

fn register_metrics() {
    describe_counter!("store.commands.total", "Actions processed by the store");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside the reducer while holding the state lock"
    );
    describe_histogram!("store.effects.count", "Effects returned per action");
    describe_counter!("store.effects.executed", "Effects executed, by type");

    describe_counter!("journal.events.appended_total", "Events written to the journal");
    describe_counter!("journal.events.loaded_total", "Events read back from the journal");
    describe_counter!("journal.append.errors_total", "Failed journal writes");
    describe_histogram!("journal.append.duration_seconds", "Journal write latency");

    describe_counter!("hub.published.total", "Notifications delivered to live channels");
    describe_counter!("hub.dropped.total", "Channels dropped as dead or lagging");
    describe_gauge!("hub.channels.active", "Registered live channels");
}

/// Journal metrics recorder.
pub struct JournalMetrics;

impl JournalMetrics {
    /// Record a successful append.
    pub fn record_append(count: usize, duration: Duration) {
        counter!("journal.events.appended_total").increment(count as u64);
        histogram!("journal.append.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed append.
    pub fn record_append_error() {
        counter!("journal.append.errors_total").increment(1);
    }

    /// Record a load.
    pub fn record_load(count: usize) {
        counter!("journal.events.loaded_total").increment(count as u64);
    }
}

/// Notification hub metrics recorder.
pub struct HubMetrics;

impl HubMetrics {
    /// Record deliveries for one publish call.
    pub fn record_delivered(count: usize) {
        counter!("hub.published.total").increment(count as u64);
    }

    /// Record channels removed by a publish or sweep.
    pub fn record_dropped(count: usize) {
        counter!("hub.dropped.total").increment(count as u64);
    }

    /// Record the number of registered channels.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_active(count: usize) {
        gauge!("hub.channels.active").set(count as f64);
    }
}
