//! Custom Axum extractors.
//!
//! Axum's own `Path` and `Json` reject with plain-text bodies. These wrappers
//! reject with [`AppError`] instead, so every 4xx has the same `{code, message}`
//! shape:
//! - `EventPath`: the `{id}` segment of `/api/events/{id}/...`
//! - `RegistrationPath`: `{id}` and `{user_id}` of a registration status URL
//! - `ApiJson<T>`: a JSON body; malformed input is a 400
//!
//! # Examples
//!
//! ```ignore
//! use admission_web::extractors::{ApiJson, EventPath};
//!
//! async fn handler(
//!     State(state): State<AppState>,
//!     EventPath(resource_id): EventPath,
//!     ApiJson(body): ApiJson<RegisterRequest>,
//! ) -> Result<StatusCode, AppError> {
//!     ...
//! }
//! ```

use crate::error::AppError;
use admission_core::{CallerId, ResourceId};
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// Event identifier taken from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPath(pub ResourceId);

#[async_trait]
impl<S> FromRequestParts<S> for EventPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        parse_id::<ResourceId>(&raw, "id").map(Self)
    }
}

/// Event and user identifiers taken from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationPath(pub ResourceId, pub CallerId);

#[async_trait]
impl<S> FromRequestParts<S> for RegistrationPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((raw_event, raw_user)) = Path::<(String, String)>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        Ok(Self(
            parse_id::<ResourceId>(&raw_event, "id")?,
            parse_id::<CallerId>(&raw_user, "user_id")?,
        ))
    }
}

/// JSON body whose rejections render as [`AppError`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            AppError::bad_request(format!("invalid JSON: {}", rejection.body_text()))
        })?;
        Ok(Self(value))
    }
}

fn parse_id<T: FromStr>(raw: &str, field: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid {field}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_parse_id() {
        let id = ResourceId::new();
        let parsed: ResourceId = parse_id(&id.to_string(), "id").unwrap();
        assert_eq!(parsed, id);

        let err = parse_id::<CallerId>("not-a-uuid", "user_id").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "[BAD_REQUEST] invalid user_id");
    }
}
