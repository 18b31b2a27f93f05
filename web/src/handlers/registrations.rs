//! Registration endpoints.
//!
//! `POST` is the admission path; every outcome gets a distinct status code
//! (see [`AppError::from_outcome`]). An `INDETERMINATE` (503) response means
//! the seat may or may not have been taken: clients should read the status
//! endpoint before retrying, although a blind retry is also safe.

use crate::error::AppError;
use crate::extractors::{ApiJson, EventPath, RegistrationPath};
use crate::state::AppState;
use admission_core::{AdmissionStatus, CallerId, RegistrationOutcome, ResourceId};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Caller asking for a seat
    pub user_id: CallerId,
}

/// Successful registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationResponse {
    /// Event registered for
    pub event_id: ResourceId,
    /// Admitted caller
    pub user_id: CallerId,
    /// Always `admitted`
    pub outcome: RegistrationOutcome,
}

/// Admission status of one caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationStatusResponse {
    /// Event queried
    pub event_id: ResourceId,
    /// Caller queried
    pub user_id: CallerId,
    /// Whether the caller holds a seat
    pub admitted: bool,
}

/// Register a caller for an event.
///
/// # Endpoint
///
/// ```text
/// POST /api/events/{id}/registrations
/// {"user_id": "..."}
/// ```
///
/// # Errors
///
/// Every outcome other than `Admitted`, plus 500 on a store failure.
pub async fn register(
    State(state): State<AppState>,
    EventPath(resource_id): EventPath,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let outcome = state.engine.register(resource_id, request.user_id).await?;

    if let Some(err) = AppError::from_outcome(outcome, resource_id) {
        return Err(err);
    }

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            event_id: resource_id,
            user_id: request.user_id,
            outcome,
        }),
    ))
}

/// List admitted callers in admission order.
///
/// # Errors
///
/// 404 if the event does not exist.
pub async fn list_registrations(
    State(state): State<AppState>,
    EventPath(resource_id): EventPath,
) -> Result<Json<Vec<CallerId>>, AppError> {
    state
        .engine
        .list_admitted(resource_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Event", resource_id))
}

/// Whether one caller holds a seat.
///
/// The lookup for resolving an `INDETERMINATE` registration.
///
/// # Errors
///
/// 404 if the event does not exist.
pub async fn registration_status(
    State(state): State<AppState>,
    RegistrationPath(resource_id, caller_id): RegistrationPath,
) -> Result<Json<RegistrationStatusResponse>, AppError> {
    let admitted = match state.engine.admission_status(resource_id, caller_id).await? {
        AdmissionStatus::Admitted => true,
        AdmissionStatus::NotAdmitted => false,
        AdmissionStatus::ResourceNotFound => {
            return Err(AppError::not_found("Event", resource_id));
        }
    };

    Ok(Json(RegistrationStatusResponse {
        event_id: resource_id,
        user_id: caller_id,
        admitted,
    }))
}
