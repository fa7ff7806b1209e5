//! Wallet endpoints

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use admela_billing::WalletTransaction;

use crate::error::ApiResult;
use crate::routes::user_id_from_headers;
use crate::state::AppState;

const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct WalletView {
    pub balance_paise: i64,
    pub transactions: Vec<WalletTransaction>,
}

/// `GET /api/wallet` - balance plus recent ledger entries.
pub async fn get_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<WalletView>> {
    let user_id = user_id_from_headers(&headers)?;

    let balance_paise = state.billing.wallet.balance(user_id).await?;
    let transactions = state
        .billing
        .wallet
        .history(user_id, HISTORY_LIMIT)
        .await?;

    Ok(Json(WalletView {
        balance_paise,
        transactions,
    }))
}
