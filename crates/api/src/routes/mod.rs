//! HTTP routes
//!
//! Thin handlers over the billing services. Auth transport is handled
//! upstream; the acting user arrives as the `x-user-id` header.

pub mod ads;
pub mod invoices;
pub mod jobs;
pub mod payments;
pub mod wallet;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ads", post(ads::create_ad))
        .route("/api/ads/quote", get(ads::posting_quote))
        .route("/api/wallet", get(wallet::get_wallet))
        .route("/api/payments/callback", post(payments::payment_callback))
        .route("/api/invoices/{id}", get(invoices::get_invoice))
        .route("/api/jobs/renewals", post(jobs::run_renewals))
        .route("/api/ops/invariants", get(jobs::run_invariants))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Extract the acting user from the `x-user-id` header.
pub(crate) fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".to_string()))?;

    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id '{}'", raw)))
}
