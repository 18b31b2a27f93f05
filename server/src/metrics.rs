//! Prometheus metrics for the admission service.
//!
//! The engine and the store record through the `metrics` facade; this module
//! installs the Prometheus recorder that collects them and serves them over HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use admission_server::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

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

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Describe every metric, install the recorder, and start the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime; the listener runs as a task on it.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or another recorder is installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        if self.started {
            return Ok(());
        }

        register_metrics();

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            // Latency buckets for every *_duration_seconds histogram
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ],
            )
            .map_err(|e: BuildError| MetricsError::Build(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        self.started = true;
        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Engine
    describe_counter!(
        "admission.register.total",
        "Registration attempts by outcome label"
    );
    describe_histogram!(
        "admission.register.duration_seconds",
        "Time from register call to outcome"
    );
    describe_counter!(
        "admission.records.created",
        "Admission records created"
    );
    describe_counter!(
        "admission.store.errors",
        "Store failures by engine operation"
    );

    // PostgreSQL store
    describe_histogram!(
        "admission.postgres.query_duration_seconds",
        "PostgreSQL round trip time by store operation"
    );
}
