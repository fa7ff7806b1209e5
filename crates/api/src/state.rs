//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use admela_billing::BillingService;

use crate::config::Config;
use crate::render::InvoiceRenderClient;

/// Shared application state, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub billing: Arc<BillingService>,
    /// Client for the external invoice renderer; `None` when not
    /// configured, in which case invoice retrieval responds 503.
    pub renderer: Option<InvoiceRenderClient>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let billing = Arc::new(BillingService::new(
            pool.clone(),
            config.supplier_state_code.clone(),
        ));
        tracing::info!(
            supplier_state_code = %config.supplier_state_code,
            "Billing service initialized"
        );

        let renderer = match &config.invoice_renderer_url {
            Some(url) => {
                tracing::info!(renderer_url = %url, "Invoice renderer configured");
                Some(InvoiceRenderClient::new(url.clone()))
            }
            None => {
                tracing::warn!(
                    "Invoice renderer not configured (missing INVOICE_RENDERER_URL) - invoice downloads disabled"
                );
                None
            }
        };

        Self {
            pool,
            config,
            billing,
            renderer,
        }
    }
}
