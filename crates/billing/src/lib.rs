// Billing crate clippy configuration
// These are intentional patterns in this crate:
#![allow(clippy::too_many_arguments)] // Ledger writes carry full audit context
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! AdMela Billing & Lifecycle Engine
//!
//! The wallet-funded ad-lifecycle and billing core of the classifieds
//! marketplace.
//!
//! ## Responsibilities
//!
//! - **Pricing**: per-category posting fee and validity resolution with a
//!   system default fallback
//! - **Posting**: membership / free-allowance / wallet-charge decision and
//!   the atomic debit-plus-ad-create posting operation
//! - **Wallet**: the only writer of user balances; append-only ledger with
//!   a reconciliation invariant
//! - **Renewal**: periodic batch that renews expired active ads at current
//!   pricing or expires them when funds run out
//! - **Invoices**: GST (18%) breakdown, sequential invoice numbering,
//!   idempotent payment recording
//! - **Invariants**: runnable consistency checks over the financial tables

pub mod error;
pub mod invariants;
pub mod invoice;
pub mod posting;
pub mod pricing;
pub mod renewal;
pub mod wallet;

#[cfg(test)]
mod edge_case_tests;

pub use error::{BillingError, BillingResult};
pub use invariants::{
    InvariantCheckSummary, InvariantViolation, LedgerInvariantChecker, ViolationSeverity,
};
pub use invoice::{
    compute_gst, document_title, gst_mode, invoice_number, GstBreakdown, GstMode, InvoiceDocument,
    InvoiceService, PaymentKind, PaymentNotification, RecordedPayment, DEFAULT_HSN_SAC,
    GST_RATE_PERCENT,
};
pub use posting::{
    decide_posting, Ad, NewAd, PostingDecision, PostingQuote, PostingService, UserSnapshot,
    FREE_AD_LIMIT,
};
pub use pricing::{PricingResolver, ResolvedPricing, DEFAULT_FEE_PAISE, DEFAULT_VALIDITY_DAYS};
pub use renewal::{RenewalOutcome, RenewalRunSummary, RenewalService};
pub use wallet::{format_rupees, TxType, WalletService, WalletTransaction};

use sqlx::PgPool;

/// One handle over the whole engine, constructed once at process start and
/// shared by reference. Each sub-service owns a pool clone; there is no
/// other process-global state.
#[derive(Clone)]
pub struct BillingService {
    pub pricing: PricingResolver,
    pub wallet: WalletService,
    pub posting: PostingService,
    pub renewal: RenewalService,
    pub invoices: InvoiceService,
    pub invariants: LedgerInvariantChecker,
}

impl BillingService {
    pub fn new(pool: PgPool, supplier_state_code: String) -> Self {
        Self {
            pricing: PricingResolver::new(pool.clone()),
            wallet: WalletService::new(pool.clone()),
            posting: PostingService::new(pool.clone()),
            renewal: RenewalService::new(pool.clone()),
            invariants: LedgerInvariantChecker::new(pool.clone()),
            invoices: InvoiceService::new(pool, supplier_state_code),
        }
    }
}
