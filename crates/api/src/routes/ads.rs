//! Ad posting endpoints

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use admela_billing::{Ad, NewAd, PostingQuote};

use crate::error::ApiResult;
use crate::routes::user_id_from_headers;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAdRequest {
    pub category_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub asking_price_paise: i64,
}

/// `POST /api/ads` - create a listing through the posting allowance gate.
///
/// 201 with the created ad, or 402 carrying the required top-up amount.
pub async fn create_ad(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAdRequest>,
) -> ApiResult<(StatusCode, Json<Ad>)> {
    let user_id = user_id_from_headers(&headers)?;

    let ad = state
        .billing
        .posting
        .post_ad(NewAd {
            user_id,
            category_id: req.category_id,
            title: req.title,
            asking_price_paise: req.asking_price_paise,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ad)))
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub category_id: Option<Uuid>,
}

/// `GET /api/ads/quote` - what posting would cost the user right now.
pub async fn posting_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QuoteParams>,
) -> ApiResult<Json<PostingQuote>> {
    let user_id = user_id_from_headers(&headers)?;

    let quote = state
        .billing
        .posting
        .quote(user_id, params.category_id)
        .await?;

    Ok(Json(quote))
}
