//! Axum HTTP adapter for the admission engine.
//!
//! A thin shell: each handler parses its input, makes one engine call and
//! maps the result to a status code. No admission logic lives here.
//!
//! # Routes
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | GET | `/health` | liveness |
//! | POST | `/api/events` | create an event |
//! | GET | `/api/events` | list events |
//! | GET | `/api/events/{id}` | fetch an event |
//! | POST | `/api/events/{id}/registrations` | register (`{"user_id": ...}`) |
//! | GET | `/api/events/{id}/registrations` | list admitted callers |
//! | GET | `/api/events/{id}/registrations/{user_id}` | one caller's status |
//!
//! # Example
//!
//! ```ignore
//! use admission_web::{router, AppState};
//!
//! let app = router(AppState::new(engine));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ApiJson, EventPath, RegistrationPath};
pub use state::AppState;

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/events",
            get(handlers::events::list_events).post(handlers::events::create_event),
        )
        .route("/events/:id", get(handlers::events::get_event))
        .route(
            "/events/:id/registrations",
            get(handlers::registrations::list_registrations)
                .post(handlers::registrations::register),
        )
        .route(
            "/events/:id/registrations/:user_id",
            get(handlers::registrations::registration_status),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
