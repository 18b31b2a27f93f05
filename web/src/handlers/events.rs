//! Event (admission record) endpoints.

use crate::error::AppError;
use crate::extractors::{ApiJson, EventPath};
use crate::state::AppState;
use admission_core::{AdmissionRecord, NewResource};
use axum::{extract::State, http::StatusCode, Json};

/// Create an event with a fixed capacity.
///
/// # Endpoint
///
/// ```text
/// POST /api/events
/// {"title": "...", "capacity": 50, "starts_at": "2025-09-01T09:00:00Z", ...}
/// ```
///
/// # Errors
///
/// - 400 for a malformed body
/// - 422 when `capacity` is not positive
pub async fn create_event(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewResource>,
) -> Result<(StatusCode, Json<AdmissionRecord>), AppError> {
    let record = state.engine.create_record(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List every event, soonest first.
///
/// # Errors
///
/// 500 on a store failure.
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdmissionRecord>>, AppError> {
    Ok(Json(state.engine.list_records().await?))
}

/// Fetch one event.
///
/// # Errors
///
/// 404 if the event does not exist.
pub async fn get_event(
    State(state): State<AppState>,
    EventPath(resource_id): EventPath,
) -> Result<Json<AdmissionRecord>, AppError> {
    state
        .engine
        .get_record(resource_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Event", resource_id))
}
