//! API server configuration

/// Configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Shared secret for verifying payment-provider callback signatures.
    pub payment_webhook_secret: String,
    /// Base URL of the external invoice renderer service. When unset the
    /// invoice download endpoint responds 503.
    pub invoice_renderer_url: Option<String>,
    /// Two-digit GST state code of the supplier entity. Decides the
    /// CGST/SGST vs IGST split against buyer GSTINs.
    pub supplier_state_code: String,
    /// Comma-separated CORS origin allowlist.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let payment_webhook_secret = std::env::var("PAYMENT_WEBHOOK_SECRET")
            .map_err(|_| anyhow::anyhow!("PAYMENT_WEBHOOK_SECRET must be set"))?;

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let invoice_renderer_url = std::env::var("INVOICE_RENDERER_URL").ok();

        let supplier_state_code =
            std::env::var("SUPPLIER_STATE_CODE").unwrap_or_else(|_| "27".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            bind_address,
            payment_webhook_secret,
            invoice_renderer_url,
            supplier_state_code,
            allowed_origins,
        })
    }
}
