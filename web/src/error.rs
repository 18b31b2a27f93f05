//! Error types for web handlers.
//!
//! [`AppError`] bridges engine results and HTTP responses. Every non-success
//! registration outcome has its own status code and machine-readable `code`,
//! so clients never have to parse messages to tell "full" from "already in"
//! from "unknown, check your status".

use admission_core::{AdmissionError, RegistrationOutcome, ResourceId};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Implements Axum's `IntoResponse`, rendering a `{code, message}` JSON body.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<AdmissionRecord>, AppError> {
///     let record = engine.get_record(id).await?
///         .ok_or_else(|| AppError::not_found("Event", id))?;
///     Ok(Json(record))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Map a registration outcome that is not `Admitted` to its response.
    ///
    /// | Outcome | Status | Code |
    /// |---|---|---|
    /// | `AlreadyAdmitted` | 400 | `ALREADY_ADMITTED` |
    /// | `CapacityExhausted` | 409 | `CAPACITY_EXHAUSTED` |
    /// | `ResourceNotFound` | 404 | `NOT_FOUND` |
    /// | `Indeterminate` | 503 | `INDETERMINATE` |
    ///
    /// Returns `None` for `Admitted`.
    #[must_use]
    pub fn from_outcome(outcome: RegistrationOutcome, resource_id: ResourceId) -> Option<Self> {
        match outcome {
            RegistrationOutcome::Admitted => None,
            RegistrationOutcome::AlreadyAdmitted => Some(Self::new(
                StatusCode::BAD_REQUEST,
                "user already registered for this event".to_string(),
                "ALREADY_ADMITTED".to_string(),
            )),
            RegistrationOutcome::CapacityExhausted => Some(Self::new(
                StatusCode::CONFLICT,
                "event is at full capacity".to_string(),
                "CAPACITY_EXHAUSTED".to_string(),
            )),
            RegistrationOutcome::ResourceNotFound => Some(Self::not_found("Event", resource_id)),
            RegistrationOutcome::Indeterminate => Some(Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "registration outcome unknown; check registration status before retrying"
                    .to_string(),
                "INDETERMINATE".to_string(),
            )),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::warn!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Request not completed"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Engine errors: bad input is a 422, store failures a 500.
impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err {
            err @ AdmissionError::InvalidCapacity { .. } => Self::validation(err.to_string()),
            AdmissionError::Store(store_err) => {
                Self::internal("An internal error occurred").with_source(store_err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admission_core::StoreError;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("Event", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Event with id 123 not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_outcome_mapping() {
        let id = ResourceId::new();
        assert!(AppError::from_outcome(RegistrationOutcome::Admitted, id).is_none());

        let cases = [
            (RegistrationOutcome::AlreadyAdmitted, StatusCode::BAD_REQUEST, "ALREADY_ADMITTED"),
            (RegistrationOutcome::CapacityExhausted, StatusCode::CONFLICT, "CAPACITY_EXHAUSTED"),
            (RegistrationOutcome::ResourceNotFound, StatusCode::NOT_FOUND, "NOT_FOUND"),
            (RegistrationOutcome::Indeterminate, StatusCode::SERVICE_UNAVAILABLE, "INDETERMINATE"),
        ];
        for (outcome, status, code) in cases {
            let err = AppError::from_outcome(outcome, id);
            assert!(err.is_some(), "{outcome} must map to an error");
            if let Some(err) = err {
                assert_eq!(err.status(), status);
                assert_eq!(err.code(), code);
            }
        }
    }

    #[test]
    fn test_admission_errors() {
        let invalid = AppError::from(AdmissionError::InvalidCapacity { capacity: 0 });
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.code(), "VALIDATION_ERROR");

        let oversized = AppError::from(AdmissionError::InvalidCapacity {
            capacity: 3_000_000_000,
        });
        assert!(oversized.to_string().contains("between 1 and"));
        assert!(!oversized.to_string().contains("greater than 0"));

        let store = AppError::from(AdmissionError::Store(StoreError::Database("boom".into())));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(std::error::Error::source(&store).is_some());
        // Internal details stay out of the message.
        assert!(!store.to_string().contains("boom"));
    }
}
