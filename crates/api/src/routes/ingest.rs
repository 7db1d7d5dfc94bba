//! Bulk opportunity ingest endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use purchase_store::{NewOpportunity, PurchaseStore};
use serde::{Deserialize, Serialize};

use super::{AppState, parse_json};
use crate::error::ApiError;
use crate::identity::bearer_from_headers;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<NewOpportunity>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub inserted: u64,
}

/// POST /ingest/opportunities — store a batch of opportunities.
///
/// The token is checked before the body is parsed.
#[tracing::instrument(skip(state, headers, body))]
pub async fn opportunities<S: PurchaseStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    state.ingest.authenticate(bearer_from_headers(&headers))?;

    let req: IngestRequest = parse_json(&body)?;
    let inserted = state.ingest.ingest(&req.records).await?;
    Ok((StatusCode::CREATED, Json(IngestResponse { inserted })))
}
