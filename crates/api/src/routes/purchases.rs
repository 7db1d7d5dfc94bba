//! Purchase initiation, payment verification and access endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{InitiatedPurchase, PaymentCallback, VerifiedPurchase};
use common::ToolkitId;
use purchase_store::PurchaseStore;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id, parse_json};
use crate::error::ApiError;
use crate::identity::Caller;

#[derive(Debug, Default, Deserialize)]
pub struct InitiatePurchaseRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub toolkit_id: ToolkitId,
    pub has_access: bool,
}

/// POST /toolkits/{id}/purchase — start a purchase, optionally with a coupon.
///
/// An empty body starts a purchase without a coupon.
#[tracing::instrument(skip(state, body))]
pub async fn initiate<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<InitiatedPurchase>), ApiError> {
    let toolkit_id: ToolkitId = parse_id(&id, "toolkit id")?;
    let req: InitiatePurchaseRequest = if body.is_empty() {
        InitiatePurchaseRequest::default()
    } else {
        parse_json(&body)?
    };
    let initiated = state
        .purchases
        .initiate(user_id, toolkit_id, req.coupon_code.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(initiated)))
}

/// POST /toolkits/{id}/purchase/verify — verify the gateway callback.
#[tracing::instrument(skip(state, body))]
pub async fn verify<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<VerifiedPurchase>, ApiError> {
    let toolkit_id: ToolkitId = parse_id(&id, "toolkit id")?;
    let callback: PaymentCallback = parse_json(&body)?;
    let verified = state
        .purchases
        .finalize(user_id, toolkit_id, &callback)
        .await?;
    Ok(Json(verified))
}

/// GET /toolkits/{id}/access — whether the caller owns the toolkit.
#[tracing::instrument(skip(state))]
pub async fn access<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<AccessResponse>, ApiError> {
    let toolkit_id: ToolkitId = parse_id(&id, "toolkit id")?;
    let has_access = state.purchases.has_access(user_id, toolkit_id).await?;
    Ok(Json(AccessResponse {
        toolkit_id,
        has_access,
    }))
}
