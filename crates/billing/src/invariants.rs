//! Ledger invariant checks
//!
//! Runnable consistency checks over the financial tables. Each invariant
//! is a real SQL query that only reads; violations carry enough context to
//! debug. Meant to be run after suspicious incidents, migrations, or on a
//! schedule.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Result of a single failed check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated.
    pub invariant: String,
    /// Affected users (empty for payment-scoped violations).
    pub user_ids: Vec<Uuid>,
    /// Human-readable description of the violation.
    pub description: String,
    /// Additional context for debugging.
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Money is wrong or can go wrong.
    Critical,
    /// Financial records inconsistent, needs attention.
    High,
    /// Should investigate.
    Medium,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// Summary of a full check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerMismatchRow {
    user_id: Uuid,
    wallet_balance_paise: i64,
    ledger_sum_paise: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct NegativeBalanceRow {
    user_id: Uuid,
    wallet_balance_paise: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct GstIdentityRow {
    payment_id: Uuid,
    invoice_number: String,
    amount_paise: i64,
    base_paise: i64,
    gst_paise: i64,
    cgst_paise: i64,
    sgst_paise: i64,
    igst_paise: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateInvoiceRow {
    invoice_number: String,
    payment_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MissingExpiryRow {
    ad_id: Uuid,
    user_id: Uuid,
}

/// Service for running ledger invariant checks.
#[derive(Clone)]
pub struct LedgerInvariantChecker {
    pool: PgPool,
}

impl LedgerInvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all checks and return a summary.
    pub async fn run_all_checks(&self) -> BillingResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_ledger_matches_balance().await?);
        violations.extend(self.check_no_negative_balance().await?);
        violations.extend(self.check_gst_identity().await?);
        violations.extend(self.check_invoice_numbers_unique().await?);
        violations.extend(self.check_active_ads_have_expiry().await?);

        let checks_run = 5;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: the ledger reconciles.
    ///
    /// For every user, the signed sum of wallet transactions must equal
    /// the stored balance. A mismatch means a balance was written outside
    /// the wallet service, or a ledger row went missing.
    async fn check_ledger_matches_balance(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<LedgerMismatchRow> = sqlx::query_as(
            r#"
            SELECT u.id AS user_id,
                   u.wallet_balance_paise,
                   COALESCE(SUM(t.amount_paise), 0) AS ledger_sum_paise
            FROM users u
            LEFT JOIN wallet_transactions t ON t.user_id = u.id
            GROUP BY u.id, u.wallet_balance_paise
            HAVING u.wallet_balance_paise != COALESCE(SUM(t.amount_paise), 0)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "ledger_matches_balance".to_string(),
                user_ids: vec![row.user_id],
                description: format!(
                    "Stored balance {} paise does not equal ledger sum {} paise",
                    row.wallet_balance_paise, row.ledger_sum_paise
                ),
                context: serde_json::json!({
                    "wallet_balance_paise": row.wallet_balance_paise,
                    "ledger_sum_paise": row.ledger_sum_paise,
                    "drift_paise": row.wallet_balance_paise - row.ledger_sum_paise,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: no wallet balance is negative.
    ///
    /// The CHECK constraint should make this impossible; the check exists
    /// so a dropped constraint is noticed.
    async fn check_no_negative_balance(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<NegativeBalanceRow> = sqlx::query_as(
            r#"
            SELECT id AS user_id, wallet_balance_paise
            FROM users
            WHERE wallet_balance_paise < 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "no_negative_balance".to_string(),
                user_ids: vec![row.user_id],
                description: format!("Wallet balance is {} paise", row.wallet_balance_paise),
                context: serde_json::json!({
                    "wallet_balance_paise": row.wallet_balance_paise,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 3: every successful payment satisfies the GST identity.
    ///
    /// `amount == base + gst`, and when gst > 0 exactly one of the
    /// CGST+SGST pair or IGST carries it.
    async fn check_gst_identity(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<GstIdentityRow> = sqlx::query_as(
            r#"
            SELECT id AS payment_id, invoice_number, amount_paise, base_paise, gst_paise,
                   cgst_paise, sgst_paise, igst_paise
            FROM payments
            WHERE status = 'success'
              AND (
                  amount_paise != base_paise + gst_paise
                  OR (gst_paise > 0 AND NOT (
                      (cgst_paise + sgst_paise = gst_paise AND igst_paise = 0)
                      OR (igst_paise = gst_paise AND cgst_paise = 0 AND sgst_paise = 0)
                  ))
              )
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "gst_identity".to_string(),
                user_ids: vec![],
                description: format!(
                    "Payment {} breaks the GST identity (amount {} = base {} + gst {}?)",
                    row.invoice_number, row.amount_paise, row.base_paise, row.gst_paise
                ),
                context: serde_json::json!({
                    "payment_id": row.payment_id,
                    "amount_paise": row.amount_paise,
                    "base_paise": row.base_paise,
                    "gst_paise": row.gst_paise,
                    "cgst_paise": row.cgst_paise,
                    "sgst_paise": row.sgst_paise,
                    "igst_paise": row.igst_paise,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 4: invoice numbers of successful payments are unique.
    async fn check_invoice_numbers_unique(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateInvoiceRow> = sqlx::query_as(
            r#"
            SELECT invoice_number, COUNT(*) AS payment_count
            FROM payments
            WHERE status = 'success'
            GROUP BY invoice_number
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "invoice_numbers_unique".to_string(),
                user_ids: vec![],
                description: format!(
                    "Invoice number {} is shared by {} payments",
                    row.invoice_number, row.payment_count
                ),
                context: serde_json::json!({
                    "invoice_number": row.invoice_number,
                    "payment_count": row.payment_count,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 5: active ads carry an expiry timestamp.
    ///
    /// An active ad without one would never come due for renewal.
    async fn check_active_ads_have_expiry(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<MissingExpiryRow> = sqlx::query_as(
            r#"
            SELECT id AS ad_id, user_id
            FROM ads
            WHERE status = 'active' AND expires_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "active_ads_have_expiry".to_string(),
                user_ids: vec![row.user_id],
                description: "Active ad has no expiry timestamp".to_string(),
                context: serde_json::json!({
                    "ad_id": row.ad_id,
                }),
                severity: ViolationSeverity::Medium,
            })
            .collect())
    }

    /// Run a single invariant check by name.
    pub async fn run_check(&self, name: &str) -> BillingResult<Vec<InvariantViolation>> {
        match name {
            "ledger_matches_balance" => self.check_ledger_matches_balance().await,
            "no_negative_balance" => self.check_no_negative_balance().await,
            "gst_identity" => self.check_gst_identity().await,
            "invoice_numbers_unique" => self.check_invoice_numbers_unique().await,
            "active_ads_have_expiry" => self.check_active_ads_have_expiry().await,
            _ => Ok(vec![]),
        }
    }

    /// List of all available invariant checks.
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "ledger_matches_balance",
            "no_negative_balance",
            "gst_identity",
            "invoice_numbers_unique",
            "active_ads_have_expiry",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn test_available_checks() {
        let checks = LedgerInvariantChecker::available_checks();
        assert_eq!(checks.len(), 5);
        assert!(checks.contains(&"ledger_matches_balance"));
        assert!(checks.contains(&"gst_identity"));
    }
}
