//! HTTP route handlers and shared application state.

pub mod admin;
pub mod coupons;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod purchases;

use std::sync::Arc;

use axum::body::Bytes;
use checkout::{CouponAdmin, IngestService, PaymentGateway, PurchaseManager};
use domain::TokenAuthenticator;
use purchase_store::PurchaseStore;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: PurchaseStore> {
    pub purchases: PurchaseManager<S, Arc<dyn PaymentGateway>>,
    pub coupons: CouponAdmin<S>,
    pub ingest: IngestService<S>,
    pub admin_auth: TokenAuthenticator,
}

/// Parses a path id, reporting a 400 on malformed input.
pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}

/// Parses a JSON body that was read before authentication.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}
