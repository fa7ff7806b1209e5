//! Operational endpoints: on-demand renewal runs and invariant checks

use axum::extract::State;
use axum::Json;
use time::OffsetDateTime;

use admela_billing::{InvariantCheckSummary, RenewalRunSummary};

use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /api/jobs/renewals` - run the renewal batch now.
///
/// The worker triggers the same service on its daily schedule; this exists
/// for operational reruns and returns the per-run summary.
pub async fn run_renewals(State(state): State<AppState>) -> ApiResult<Json<RenewalRunSummary>> {
    let summary = state
        .billing
        .renewal
        .run(OffsetDateTime::now_utc())
        .await?;

    Ok(Json(summary))
}

/// `GET /api/ops/invariants` - run the ledger consistency checks.
pub async fn run_invariants(
    State(state): State<AppState>,
) -> ApiResult<Json<InvariantCheckSummary>> {
    let summary = state.billing.invariants.run_all_checks().await?;

    if !summary.healthy {
        tracing::warn!(
            checks_failed = summary.checks_failed,
            violations = summary.violations.len(),
            "Ledger invariant violations detected"
        );
    }

    Ok(Json(summary))
}
