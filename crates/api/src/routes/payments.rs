//! Payment-provider callback
//!
//! The provider signs the raw callback body with HMAC-SHA256 over the
//! shared webhook secret, sent hex-encoded in `x-provider-signature`. The
//! signature is verified before the payload is parsed; recording itself is
//! idempotent against duplicate deliveries.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use admela_billing::{PaymentNotification, RecordedPayment};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Verify a hex-encoded HMAC-SHA256 signature over the raw payload.
pub(crate) fn verify_signature(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());

    computed == signature_hex.to_lowercase()
}

/// `POST /api/payments/callback` - record a completed provider payment.
///
/// Idempotent: re-delivery of the same provider payment id returns the
/// original record with `duplicate: true` and credits nothing twice.
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<RecordedPayment>> {
    let signature = headers
        .get("x-provider-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing x-provider-signature".to_string()))?;

    if !verify_signature(&state.config.payment_webhook_secret, &body, signature) {
        return Err(ApiError::Unauthorized(
            "payment callback signature mismatch".to_string(),
        ));
    }

    let notification: PaymentNotification = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed payment callback: {}", e)))?;

    tracing::info!(
        user_id = %notification.user_id,
        provider_payment_id = %notification.provider_payment_id,
        amount_paise = notification.amount_paise,
        "Payment callback received"
    );

    let recorded = state.billing.invoices.record_payment(notification).await?;

    Ok(Json(recorded))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let secret = "whsec_test_secret";
        let payload = br#"{"amount_paise":10000}"#;
        let signature = sign(secret, payload);

        assert!(verify_signature(secret, payload, &signature));
    }

    #[test]
    fn test_uppercase_hex_signature_accepted() {
        let secret = "whsec_test_secret";
        let payload = b"payload";
        let signature = sign(secret, payload).to_uppercase();

        assert!(verify_signature(secret, payload, &signature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let secret = "whsec_test_secret";
        let signature = sign(secret, b"original");

        assert!(!verify_signature(secret, b"tampered", &signature));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"payload";
        let signature = sign("secret-a", payload);

        assert!(!verify_signature("secret-b", payload, &signature));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        assert!(!verify_signature("secret", b"payload", "not-hex-at-all"));
    }
}
