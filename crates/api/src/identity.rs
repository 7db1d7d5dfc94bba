//! Caller identity and bearer token extraction.
//!
//! The upstream authentication proxy injects the signed-in user's id as the
//! `x-user-id` header. Trusted machine callers send `Authorization: Bearer`.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Rejects with 401 when the header is absent.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)?
            .map(Caller)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Reads the optional caller id. A present but malformed id is a bad request.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Option<UserId>, ApiError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<UserId>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header")))
}

/// Reads the bearer token from the `Authorization` header.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(domain::bearer_token)
}
