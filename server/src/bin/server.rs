//! Event admission HTTP server.
//!
//! Connects to `PostgreSQL`, applies migrations, and serves the registration API
//! until Ctrl-C or SIGTERM.

use admission_core::{AdmissionEngine, SystemClock};
use admission_postgres::PostgresAdmissionStore;
use admission_server::shutdown::{Drain, serve_with_grace, shutdown_signal};
use admission_server::{Config, MetricsServer, telemetry};
use admission_web::{AppState, router};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    info!("Starting event admission server");

    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_addr = config.server.bind_addr()?;
    let metrics_addr = config.server.metrics_addr()?;
    info!(
        bind_addr = %bind_addr,
        metrics_addr = %metrics_addr,
        store_timeout_ms = config.engine.store_timeout_ms,
        "Configuration loaded"
    );

    let mut metrics_server = MetricsServer::new(metrics_addr);
    metrics_server.start()?;

    info!("Connecting to admission database...");
    let store = PostgresAdmissionStore::connect(&config.postgres())
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to run migrations")?;
    info!("Database ready");

    let engine = AdmissionEngine::with_config(
        Arc::new(store.clone()),
        Arc::new(SystemClock),
        config.engine(),
    );
    let app = router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "Server listening");

    let grace = config.server.shutdown_grace();
    let drain = serve_with_grace(listener, app, shutdown_signal(), grace)
        .await
        .context("Server error")?;
    if drain == Drain::TimedOut {
        warn!(grace_secs = grace.as_secs(), "Dropped requests still running at shutdown");
    }

    info!(grace_secs = grace.as_secs(), "Draining database connections");
    if tokio::time::timeout(grace, store.pool().close()).await.is_err() {
        warn!("Database pool did not close within the shutdown timeout");
    }

    info!("Server stopped");
    Ok(())
}
