//! Coupon preview endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::CouponPreview;
use common::ToolkitId;
use purchase_store::PurchaseStore;
use serde::Deserialize;

use super::{AppState, parse_json};
use crate::error::ApiError;
use crate::identity::caller_from_headers;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub toolkit_id: ToolkitId,
}

/// POST /coupons/validate — preview a coupon without consuming it.
///
/// Signed-in callers also get their per-user limit checked.
#[tracing::instrument(skip(state, headers, body))]
pub async fn validate<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CouponPreview>, ApiError> {
    let user_id = caller_from_headers(&headers)?;
    let req: ValidateCouponRequest = parse_json(&body)?;
    let preview = state
        .purchases
        .validate_coupon(&req.code, req.toolkit_id, user_id)
        .await?;
    Ok(Json(preview))
}
