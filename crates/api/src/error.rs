//! API error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use admela_billing::BillingError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // A blocked post tells the user exactly how much to top up.
            ApiError::Billing(BillingError::InsufficientFunds {
                required_paise,
                available_paise,
            }) => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({
                    "error": "insufficient-funds",
                    "required_paise": required_paise,
                    "balance_paise": available_paise,
                    "shortfall_paise": required_paise - available_paise,
                })),
            )
                .into_response(),

            ApiError::Billing(BillingError::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "not-found", "detail": what })),
            )
                .into_response(),

            ApiError::Billing(BillingError::InvalidAmount(amount)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid-amount", "amount_paise": amount })),
            )
                .into_response(),

            ApiError::Billing(BillingError::Database(e)) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal" })),
                )
                    .into_response()
            }

            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad-request", "detail": detail })),
            )
                .into_response(),

            ApiError::Unauthorized(detail) => {
                tracing::warn!(detail = %detail, "Unauthorized request");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "unauthorized" })),
                )
                    .into_response()
            }

            ApiError::Unavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "unavailable", "detail": detail })),
            )
                .into_response(),

            ApiError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal" })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
