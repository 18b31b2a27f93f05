//! Health check endpoint.
//!
//! Used by load balancers and container orchestrators to verify the process is up.

use axum::http::StatusCode;

/// Liveness probe.
///
/// Does NOT touch the store.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
