//! Invoice retrieval
//!
//! Fetches a recorded payment, assembles the invoice document and streams
//! the PDF produced by the external renderer. The `action` query switches
//! the `Content-Disposition` between inline viewing and download.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InvoiceParams {
    pub action: Option<String>,
}

/// `GET /api/invoices/{id}?action=view|download`
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Query(params): Query<InvoiceParams>,
) -> ApiResult<Response> {
    let action = params.action.as_deref().unwrap_or("view");
    let disposition_kind = match action {
        "view" => "inline",
        "download" => "attachment",
        other => {
            return Err(ApiError::BadRequest(format!(
                "invalid action '{}', expected view or download",
                other
            )))
        }
    };

    let renderer = state.renderer.as_ref().ok_or_else(|| {
        ApiError::Unavailable("invoice renderer not configured".to_string())
    })?;

    let document = state.billing.invoices.invoice_document(payment_id).await?;
    let invoice_number = document.invoice_number.clone();

    let pdf = renderer
        .render_pdf(&document)
        .await
        .map_err(ApiError::Internal)?;

    tracing::info!(
        payment_id = %payment_id,
        invoice_number = %invoice_number,
        action = action,
        "Invoice served"
    );

    let disposition = format!("{}; filename=\"{}.pdf\"", disposition_kind, invoice_number);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}
