//! Coupon administration endpoints, guarded by the admin bearer token.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{CouponId, Money};
use domain::CouponDraft;
use purchase_store::{Coupon, CouponUpdate, PurchaseStore};
use serde::{Deserialize, Deserializer};

use super::{AppState, parse_id, parse_json};
use crate::error::ApiError;
use crate::identity::bearer_from_headers;

/// Partial coupon update as sent over the wire.
///
/// An absent field is left unchanged; an explicit `null` clears a nullable
/// field.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouponPatch {
    #[serde(default)]
    pub discount_amount: Option<Money>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_uses: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_uses_per_user: Option<Option<i32>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<CouponPatch> for CouponUpdate {
    fn from(patch: CouponPatch) -> Self {
        Self {
            discount_amount: patch.discount_amount,
            max_uses: patch.max_uses,
            max_uses_per_user: patch.max_uses_per_user,
            is_active: patch.is_active,
            expires_at: patch.expires_at,
        }
    }
}

fn authorize<S: PurchaseStore>(state: &AppState<S>, headers: &HeaderMap) -> Result<(), ApiError> {
    state
        .admin_auth
        .authenticate(bearer_from_headers(headers))
        .map_err(|err| {
            metrics::counter!("admin_auth_failures_total").increment(1);
            tracing::warn!(error = %err, "admin authentication failed");
            ApiError::from(err)
        })
}

/// POST /admin/coupons — create a coupon.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    authorize(&state, &headers)?;
    let draft: CouponDraft = parse_json(&body)?;
    let coupon = state.coupons.create(draft).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// GET /admin/coupons/{id} — a coupon with its current usage.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Coupon>, ApiError> {
    authorize(&state, &headers)?;
    let coupon_id: CouponId = parse_id(&id, "coupon id")?;
    Ok(Json(state.coupons.get(coupon_id).await?))
}

/// PATCH /admin/coupons/{id} — apply a partial update.
#[tracing::instrument(skip(state, headers, body))]
pub async fn update<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Coupon>, ApiError> {
    authorize(&state, &headers)?;
    let coupon_id: CouponId = parse_id(&id, "coupon id")?;
    let patch: CouponPatch = parse_json(&body)?;
    let coupon = state.coupons.update(coupon_id, patch.into()).await?;
    Ok(Json(coupon))
}
