//! Invoice & GST computation
//!
//! Derives the GST breakdown and a sequential invoice number from a
//! completed payment, records the payment atomically with its wallet
//! credit (or membership extension), and assembles the document fed to the
//! external invoice renderer.
//!
//! GST is a fixed 18% of the pre-tax base: `gross = base * 1.18`. All
//! arithmetic is integer paise; the base is rounded half-up and GST is the
//! exact remainder, so `base + gst == gross` always.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::wallet::{TxType, WalletService};

/// GST rate as a percentage of the pre-tax base.
pub const GST_RATE_PERCENT: i64 = 18;

/// HSN/SAC code for classifieds listing services, used when none is
/// configured for the plan.
pub const DEFAULT_HSN_SAC: &str = "998319";

/// Membership plan length when the notification does not carry one
/// (annual membership).
pub const DEFAULT_MEMBERSHIP_DAYS: i64 = 365;

/// Advisory-lock namespace for per-year invoice sequencing.
const INVOICE_SEQ_LOCK_NS: i64 = 0x41444d_494e56;

/// Which GST split applies to a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GstMode {
    /// Supplier and buyer in the same state: CGST + SGST.
    IntraState,
    /// Buyer registered in another state: IGST.
    InterState,
}

/// Decide the GST mode from the buyer's GSTIN.
///
/// The first two digits of a GSTIN are the state code. No GSTIN, or a
/// GSTIN in the supplier's own state, is treated as intra-state (the
/// consumer default).
pub fn gst_mode(buyer_gstin: Option<&str>, supplier_state_code: &str) -> GstMode {
    match buyer_gstin.and_then(|gstin| gstin.get(..2)) {
        Some(prefix) if prefix != supplier_state_code => GstMode::InterState,
        _ => GstMode::IntraState,
    }
}

/// GST breakdown of a gross amount. Exactly one of the CGST+SGST pair or
/// IGST is populated; the other side is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GstBreakdown {
    pub base_paise: i64,
    pub gst_paise: i64,
    pub cgst_paise: i64,
    pub sgst_paise: i64,
    pub igst_paise: i64,
}

/// Split a gross (tax-inclusive) amount into base and GST components.
///
/// `base = round(gross / 1.18)` with half-up rounding in integer paise;
/// GST is the exact remainder. Intra-state halves GST into CGST/SGST with
/// the odd paisa going to SGST, so the identity `cgst + sgst == gst` holds
/// exactly.
pub fn compute_gst(gross_paise: i64, mode: GstMode) -> GstBreakdown {
    let divisor = 100 + GST_RATE_PERCENT;
    let base_paise = (gross_paise * 100 + divisor / 2) / divisor;
    let gst_paise = gross_paise - base_paise;

    match mode {
        GstMode::IntraState => {
            let cgst_paise = gst_paise / 2;
            GstBreakdown {
                base_paise,
                gst_paise,
                cgst_paise,
                sgst_paise: gst_paise - cgst_paise,
                igst_paise: 0,
            }
        }
        GstMode::InterState => GstBreakdown {
            base_paise,
            gst_paise,
            cgst_paise: 0,
            sgst_paise: 0,
            igst_paise: gst_paise,
        },
    }
}

/// Format a sequential invoice number: `INV-<year>-<4-digit sequence>`.
pub fn invoice_number(year: i32, sequence: i64) -> String {
    format!("INV-{}-{:04}", year, sequence)
}

/// What the payment was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentKind {
    WalletTopup,
    Membership,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::WalletTopup => "wallet-topup",
            PaymentKind::Membership => "membership",
        }
    }
}

/// A completed payment as reported by the external provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    pub user_id: Uuid,
    pub kind: PaymentKind,
    /// Gross (tax-inclusive) amount in paise.
    pub amount_paise: i64,
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub plan_name: String,
    pub buyer_gstin: Option<String>,
    /// Membership length in days; ignored for wallet top-ups.
    pub plan_days: Option<i64>,
}

/// Result of recording a payment.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedPayment {
    pub payment_id: Uuid,
    pub invoice_number: String,
    pub amount_paise: i64,
    pub breakdown: GstBreakdown,
    /// New wallet balance after a top-up credit; `None` for membership
    /// payments and duplicate deliveries.
    pub new_balance_paise: Option<i64>,
    /// True when this provider payment was already recorded; nothing was
    /// credited again.
    pub duplicate: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ExistingPayment {
    id: Uuid,
    invoice_number: String,
    amount_paise: i64,
    base_paise: i64,
    gst_paise: i64,
    cgst_paise: i64,
    sgst_paise: i64,
    igst_paise: i64,
}

/// Renderer input for one invoice. The renderer collaborator owns layout;
/// this struct carries every field it needs.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    /// "TAX INVOICE" when a buyer GSTIN is on record, plain "INVOICE"
    /// otherwise.
    pub title: &'static str,
    pub invoice_number: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_gstin: Option<String>,
    /// Line-item description.
    pub plan_name: String,
    pub hsn_sac: String,
    pub amount_paise: i64,
    pub base_paise: i64,
    pub gst_paise: i64,
    pub cgst_paise: i64,
    pub sgst_paise: i64,
    pub igst_paise: i64,
    pub paid_at: Option<OffsetDateTime>,
}

/// A GSTIN on record makes the document a tax invoice.
pub fn document_title(buyer_gstin: Option<&str>) -> &'static str {
    match buyer_gstin {
        Some(gstin) if !gstin.is_empty() => "TAX INVOICE",
        _ => "INVOICE",
    }
}

/// Invoice recording and retrieval.
#[derive(Clone)]
pub struct InvoiceService {
    pool: PgPool,
    supplier_state_code: String,
}

impl InvoiceService {
    pub fn new(pool: PgPool, supplier_state_code: String) -> Self {
        Self {
            pool,
            supplier_state_code,
        }
    }

    /// Record a completed provider payment.
    ///
    /// Idempotent against duplicate provider callbacks: the insert claims
    /// the `provider_payment_id` atomically, and a duplicate returns the
    /// already-recorded payment without touching the wallet. The invoice
    /// sequence is computed under a per-year advisory transaction lock, so
    /// concurrent completions cannot collide on a number.
    pub async fn record_payment(
        &self,
        notification: PaymentNotification,
    ) -> BillingResult<RecordedPayment> {
        if notification.amount_paise <= 0 {
            return Err(BillingError::InvalidAmount(notification.amount_paise));
        }

        let now = OffsetDateTime::now_utc();
        let year = now.year();
        let mode = gst_mode(
            notification.buyer_gstin.as_deref(),
            &self.supplier_state_code,
        );
        let breakdown = compute_gst(notification.amount_paise, mode);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        // Serialize invoice numbering per calendar year. Released on
        // commit/rollback; the UNIQUE constraint on invoice_number is the
        // backstop.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(INVOICE_SEQ_LOCK_NS ^ i64::from(year))
            .execute(&mut *tx)
            .await?;

        let sequence: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) + 1
            FROM payments
            WHERE status = 'success' AND EXTRACT(YEAR FROM paid_at)::INT = $1
            "#,
        )
        .bind(year)
        .fetch_one(&mut *tx)
        .await?;

        let inv_number = invoice_number(year, sequence);

        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO payments (user_id, kind, amount_paise, base_paise, gst_paise,
                                  cgst_paise, sgst_paise, igst_paise, status,
                                  provider_order_id, provider_payment_id, invoice_number,
                                  plan_name, buyer_gstin, hsn_sac, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'success', $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (provider_payment_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(notification.amount_paise)
        .bind(breakdown.base_paise)
        .bind(breakdown.gst_paise)
        .bind(breakdown.cgst_paise)
        .bind(breakdown.sgst_paise)
        .bind(breakdown.igst_paise)
        .bind(&notification.provider_order_id)
        .bind(&notification.provider_payment_id)
        .bind(&inv_number)
        .bind(&notification.plan_name)
        .bind(&notification.buyer_gstin)
        .bind(DEFAULT_HSN_SAC)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((payment_id,)) = claimed else {
            // Duplicate delivery: nothing was inserted, nothing gets
            // credited. Surface the original record.
            drop(tx);

            let existing: ExistingPayment = sqlx::query_as(
                r#"
                SELECT id, invoice_number, amount_paise, base_paise, gst_paise,
                       cgst_paise, sgst_paise, igst_paise
                FROM payments
                WHERE provider_payment_id = $1
                "#,
            )
            .bind(&notification.provider_payment_id)
            .fetch_one(&self.pool)
            .await?;

            tracing::info!(
                user_id = %notification.user_id,
                provider_payment_id = %notification.provider_payment_id,
                payment_id = %existing.id,
                "Duplicate payment callback ignored"
            );

            return Ok(RecordedPayment {
                payment_id: existing.id,
                invoice_number: existing.invoice_number,
                amount_paise: existing.amount_paise,
                breakdown: GstBreakdown {
                    base_paise: existing.base_paise,
                    gst_paise: existing.gst_paise,
                    cgst_paise: existing.cgst_paise,
                    sgst_paise: existing.sgst_paise,
                    igst_paise: existing.igst_paise,
                },
                new_balance_paise: None,
                duplicate: true,
            });
        };

        let new_balance_paise = match notification.kind {
            PaymentKind::WalletTopup => Some(
                WalletService::credit_in_tx(
                    &mut tx,
                    notification.user_id,
                    notification.amount_paise,
                    TxType::Topup,
                    &format!("Wallet top-up ({})", inv_number),
                    None,
                )
                .await?,
            ),
            PaymentKind::Membership => {
                let days = notification.plan_days.unwrap_or(DEFAULT_MEMBERSHIP_DAYS);
                // Extend from the current expiry when still active, from
                // now when lapsed.
                sqlx::query(
                    r#"
                    UPDATE users
                    SET membership_expires_at =
                        GREATEST(COALESCE(membership_expires_at, $2), $2)
                        + make_interval(days => $3::INT)
                    WHERE id = $1
                    "#,
                )
                .bind(notification.user_id)
                .bind(now)
                .bind(days)
                .execute(&mut *tx)
                .await?;
                None
            }
        };

        tx.commit()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        tracing::info!(
            user_id = %notification.user_id,
            payment_id = %payment_id,
            invoice_number = %inv_number,
            kind = notification.kind.as_str(),
            amount_paise = notification.amount_paise,
            gst_paise = breakdown.gst_paise,
            "Payment recorded"
        );

        Ok(RecordedPayment {
            payment_id,
            invoice_number: inv_number,
            amount_paise: notification.amount_paise,
            breakdown,
            new_balance_paise,
            duplicate: false,
        })
    }

    /// Assemble the renderer input for a recorded payment.
    pub async fn invoice_document(&self, payment_id: Uuid) -> BillingResult<InvoiceDocument> {
        #[derive(sqlx::FromRow)]
        struct DocRow {
            invoice_number: String,
            buyer_name: String,
            buyer_email: String,
            buyer_gstin: Option<String>,
            plan_name: String,
            hsn_sac: String,
            amount_paise: i64,
            base_paise: i64,
            gst_paise: i64,
            cgst_paise: i64,
            sgst_paise: i64,
            igst_paise: i64,
            paid_at: Option<OffsetDateTime>,
        }

        let row: Option<DocRow> = sqlx::query_as(
            r#"
            SELECT p.invoice_number, u.display_name AS buyer_name, u.email AS buyer_email,
                   p.buyer_gstin, p.plan_name, p.hsn_sac, p.amount_paise, p.base_paise,
                   p.gst_paise, p.cgst_paise, p.sgst_paise, p.igst_paise, p.paid_at
            FROM payments p
            JOIN users u ON u.id = p.user_id
            WHERE p.id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| BillingError::NotFound(format!("payment {}", payment_id)))?;

        Ok(InvoiceDocument {
            title: document_title(row.buyer_gstin.as_deref()),
            invoice_number: row.invoice_number,
            buyer_name: row.buyer_name,
            buyer_email: row.buyer_email,
            buyer_gstin: row.buyer_gstin,
            plan_name: row.plan_name,
            hsn_sac: row.hsn_sac,
            amount_paise: row.amount_paise,
            base_paise: row.base_paise,
            gst_paise: row.gst_paise,
            cgst_paise: row.cgst_paise,
            sgst_paise: row.sgst_paise,
            igst_paise: row.igst_paise,
            paid_at: row.paid_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gst_identity_holds_for_sample_amounts() {
        for gross in [1, 99, 100, 118, 10_000, 99_999, 10_000_000] {
            for mode in [GstMode::IntraState, GstMode::InterState] {
                let b = compute_gst(gross, mode);
                assert_eq!(b.base_paise + b.gst_paise, gross, "gross {}", gross);
                assert_eq!(b.cgst_paise + b.sgst_paise + b.igst_paise, b.gst_paise);
            }
        }
    }

    #[test]
    fn test_hundred_rupee_topup_breakdown() {
        // ₹100 gross: base ₹84.75, GST ₹15.25, CGST ₹7.62, SGST ₹7.63.
        let b = compute_gst(10_000, GstMode::IntraState);
        assert_eq!(b.base_paise, 8475);
        assert_eq!(b.gst_paise, 1525);
        assert_eq!(b.cgst_paise, 762);
        assert_eq!(b.sgst_paise, 763);
        assert_eq!(b.igst_paise, 0);
    }

    #[test]
    fn test_inter_state_uses_igst_only() {
        let b = compute_gst(10_000, GstMode::InterState);
        assert_eq!(b.igst_paise, 1525);
        assert_eq!(b.cgst_paise, 0);
        assert_eq!(b.sgst_paise, 0);
    }

    #[test]
    fn test_gst_mode_from_gstin_state_prefix() {
        // Supplier registered in Maharashtra (27).
        assert_eq!(gst_mode(None, "27"), GstMode::IntraState);
        assert_eq!(gst_mode(Some("27AAPFU0939F1ZV"), "27"), GstMode::IntraState);
        assert_eq!(gst_mode(Some("29AAPFU0939F1ZV"), "27"), GstMode::InterState);
        // Degenerate GSTIN falls back to the consumer default.
        assert_eq!(gst_mode(Some("2"), "27"), GstMode::IntraState);
    }

    #[test]
    fn test_invoice_number_format() {
        assert_eq!(invoice_number(2026, 1), "INV-2026-0001");
        assert_eq!(invoice_number(2026, 42), "INV-2026-0042");
        // The pad is a floor, not a cap.
        assert_eq!(invoice_number(2026, 12345), "INV-2026-12345");
    }

    #[test]
    fn test_document_title_switches_on_gstin() {
        assert_eq!(document_title(None), "INVOICE");
        assert_eq!(document_title(Some("")), "INVOICE");
        assert_eq!(document_title(Some("27AAPFU0939F1ZV")), "TAX INVOICE");
    }
}
