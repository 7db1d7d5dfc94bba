//! HTTP API server for the toolkit purchase engine.
//!
//! Provides endpoints for coupon previews, purchase initiation and payment
//! verification, access checks, coupon administration and bulk ingest, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CouponAdmin, InMemoryPaymentGateway, IngestService, PaymentGateway, PurchaseManager};
use domain::{PaymentVerifier, SignatureError, TokenAuthenticator};
use metrics_exporter_prometheus::PrometheusHandle;
use purchase_store::PurchaseStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: PurchaseStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/coupons/validate", post(routes::coupons::validate::<S>))
        .route(
            "/toolkits/{id}/purchase",
            post(routes::purchases::initiate::<S>),
        )
        .route(
            "/toolkits/{id}/purchase/verify",
            post(routes::purchases::verify::<S>),
        )
        .route("/toolkits/{id}/access", get(routes::purchases::access::<S>))
        .route("/admin/coupons", post(routes::admin::create::<S>))
        .route(
            "/admin/coupons/{id}",
            get(routes::admin::get::<S>).patch(routes::admin::update::<S>),
        )
        .route(
            "/ingest/opportunities",
            post(routes::ingest::opportunities::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state around a store and payment gateway.
pub fn create_state<S: PurchaseStore + Clone + 'static>(
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    config: &Config,
) -> Result<Arc<AppState<S>>, SignatureError> {
    let verifier = PaymentVerifier::new(&config.payment_key_secret)?;

    Ok(Arc::new(AppState {
        purchases: PurchaseManager::new(
            store.clone(),
            gateway,
            verifier,
            config.payment_currency.clone(),
        ),
        coupons: CouponAdmin::new(store.clone()),
        ingest: IngestService::new(store, TokenAuthenticator::new(config.ingest_token.clone())),
        admin_auth: TokenAuthenticator::new(config.admin_token.clone()),
    }))
}

/// Creates application state with the in-memory payment gateway.
pub fn create_default_state<S: PurchaseStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<Arc<AppState<S>>, SignatureError> {
    create_state(store, Arc::new(InMemoryPaymentGateway::new()), config)
}
