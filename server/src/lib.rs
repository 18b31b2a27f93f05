//! Process wiring for the admission engine.
//!
//! Shared by the `server` and `conctest` binaries:
//! - [`config`]: environment-driven configuration
//! - [`metrics`]: Prometheus exporter and metric descriptions
//! - [`shutdown`]: signal handling and bounded request draining
//! - [`telemetry`]: tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;

pub use crate::config::{Backend, Config, ConfigError};
pub use crate::metrics::{MetricsError, MetricsServer};
