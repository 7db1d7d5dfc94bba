//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{SignatureError, TokenAuthError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No caller identity on a route that needs one.
    Unauthorized,
    /// Bad request from the client.
    BadRequest(String),
    /// Bearer token check failed.
    TokenAuth(TokenAuthError),
    /// Checkout or administration error.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
                None,
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::TokenAuth(err) => {
                let status = match err {
                    TokenAuthError::MissingToken => StatusCode::UNAUTHORIZED,
                    TokenAuthError::InvalidToken | TokenAuthError::Disabled => {
                        StatusCode::FORBIDDEN
                    }
                };
                (status, err.to_string(), None)
            }
            ApiError::Checkout(err) => checkout_error_to_response(err),
        };

        let body = match code {
            Some(code) => serde_json::json!({ "error": message, "code": code }),
            None => serde_json::json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String, Option<&'static str>) {
    match &err {
        CheckoutError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string(), None),
        CheckoutError::Coupon(coupon_err) => (
            StatusCode::BAD_REQUEST,
            err.to_string(),
            Some(coupon_err.reason()),
        ),
        CheckoutError::Signature(SignatureError::InvalidSignature) => (
            StatusCode::BAD_REQUEST,
            "Invalid payment signature".to_string(),
            None,
        ),
        CheckoutError::ToolkitNotFound(_)
        | CheckoutError::CouponNotFound(_)
        | CheckoutError::PurchaseNotFound => (StatusCode::NOT_FOUND, err.to_string(), None),
        CheckoutError::Forbidden => (StatusCode::FORBIDDEN, err.to_string(), None),
        CheckoutError::AlreadyPurchased
        | CheckoutError::DuplicateCouponCode(_)
        | CheckoutError::MaxUsesBelowCurrentUses { .. } => {
            (StatusCode::CONFLICT, err.to_string(), None)
        }
        CheckoutError::Gateway(_) => {
            tracing::error!(error = %err, "payment gateway error");
            (
                StatusCode::BAD_GATEWAY,
                "Payment provider unavailable, please retry".to_string(),
                None,
            )
        }
        CheckoutError::Signature(_)
        | CheckoutError::OrderNotAttached(_)
        | CheckoutError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<TokenAuthError> for ApiError {
    fn from(err: TokenAuthError) -> Self {
        ApiError::TokenAuth(err)
    }
}
