//! Expiry & renewal batch
//!
//! Finds active ads past their expiry and either renews them from the
//! owner's wallet at the *current* category pricing, or marks them expired.
//! Each ad is processed in its own transaction; one bad record never stops
//! the run. The per-run summary is the job's observability surface.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::pricing::{PricingResolver, ResolvedPricing};
use crate::wallet::{format_rupees, TxType, WalletService};

/// How many ads are processed concurrently. Each item holds only its own
/// per-user row lock, so a small factor is enough to hide latency without
/// piling up lock contention.
const RENEWAL_CONCURRENCY: usize = 4;

/// What happened to one due ad.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RenewalOutcome {
    /// Wallet covered the current fee; expiry pushed out.
    Renewed { ad_id: Uuid, fee_paise: i64 },
    /// Wallet could not cover the fee; status set to expired.
    Expired { ad_id: Uuid },
    /// Left untouched (owner missing, or another run got there first).
    Skipped { ad_id: Uuid, reason: String },
    /// Processing failed; the ad will be retried on the next run.
    Error { ad_id: Uuid, error: String },
}

/// Per-run summary for observability.
#[derive(Debug, Clone, Serialize)]
pub struct RenewalRunSummary {
    pub started_at: OffsetDateTime,
    pub due: usize,
    pub renewed: usize,
    pub expired: usize,
    pub skipped: usize,
    pub errored: usize,
    pub outcomes: Vec<RenewalOutcome>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DueAd {
    id: Uuid,
    user_id: Uuid,
    category_id: Uuid,
    title: String,
}

/// Pure renewal decision, split out for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenewalDecision {
    Renew { charge_paise: i64 },
    Expire,
}

pub(crate) fn decide_renewal(balance_paise: i64, fee_paise: i64) -> RenewalDecision {
    if balance_paise >= fee_paise {
        RenewalDecision::Renew {
            charge_paise: fee_paise,
        }
    } else {
        RenewalDecision::Expire
    }
}

/// The renewal batch job.
#[derive(Clone)]
pub struct RenewalService {
    pool: PgPool,
    pricing: PricingResolver,
}

impl RenewalService {
    pub fn new(pool: PgPool) -> Self {
        let pricing = PricingResolver::new(pool.clone());
        Self { pool, pricing }
    }

    /// Run the batch over all ads due at `now`.
    ///
    /// Idempotent-safe under re-run: renewed ads no longer match the due
    /// query, expired ads are excluded by status, and each item re-checks
    /// its due-ness under the row lock before mutating.
    pub async fn run(&self, now: OffsetDateTime) -> BillingResult<RenewalRunSummary> {
        let due: Vec<DueAd> = sqlx::query_as(
            r#"
            SELECT id, user_id, category_id, title
            FROM ads
            WHERE status = 'active' AND expires_at <= $1
            ORDER BY expires_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let total = due.len();
        tracing::info!(due = total, "Renewal run starting");

        let outcomes: Vec<RenewalOutcome> = stream::iter(due)
            .map(|ad| self.process_one(ad, now))
            .buffer_unordered(RENEWAL_CONCURRENCY)
            .collect()
            .await;

        let summary = RenewalRunSummary {
            started_at: now,
            due: total,
            renewed: outcomes
                .iter()
                .filter(|o| matches!(o, RenewalOutcome::Renewed { .. }))
                .count(),
            expired: outcomes
                .iter()
                .filter(|o| matches!(o, RenewalOutcome::Expired { .. }))
                .count(),
            skipped: outcomes
                .iter()
                .filter(|o| matches!(o, RenewalOutcome::Skipped { .. }))
                .count(),
            errored: outcomes
                .iter()
                .filter(|o| matches!(o, RenewalOutcome::Error { .. }))
                .count(),
            outcomes,
        };

        tracing::info!(
            due = summary.due,
            renewed = summary.renewed,
            expired = summary.expired,
            skipped = summary.skipped,
            errored = summary.errored,
            "Renewal run complete"
        );

        Ok(summary)
    }

    /// Process one ad, capturing any error into the outcome instead of
    /// propagating it.
    async fn process_one(&self, ad: DueAd, now: OffsetDateTime) -> RenewalOutcome {
        let ad_id = ad.id;
        match self.try_renew(ad, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(ad_id = %ad_id, error = %e, "Renewal processing failed");
                RenewalOutcome::Error {
                    ad_id,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_renew(&self, ad: DueAd, now: OffsetDateTime) -> BillingResult<RenewalOutcome> {
        // Renewal always uses the pricing in effect now, not the price the
        // ad was originally posted at.
        let pricing = self.pricing.resolve(ad.category_id).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        let balance: Option<(i64,)> =
            sqlx::query_as("SELECT wallet_balance_paise FROM users WHERE id = $1 FOR UPDATE")
                .bind(ad.user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((balance,)) = balance else {
            tracing::warn!(
                ad_id = %ad.id,
                user_id = %ad.user_id,
                "Renewal found ad with missing owner, skipping"
            );
            return Ok(RenewalOutcome::Skipped {
                ad_id: ad.id,
                reason: "owner missing".to_string(),
            });
        };

        // Re-check due-ness under the lock: a concurrent run (or a manual
        // trigger racing the cron) may already have handled this ad.
        let still_due: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM ads WHERE id = $1 AND status = 'active' AND expires_at <= $2 FOR UPDATE",
        )
        .bind(ad.id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if still_due.is_none() {
            return Ok(RenewalOutcome::Skipped {
                ad_id: ad.id,
                reason: "already processed".to_string(),
            });
        }

        match decide_renewal(balance, pricing.fee_paise) {
            RenewalDecision::Renew { charge_paise } => {
                self.apply_renewal(&mut tx, &ad, &pricing, charge_paise, now)
                    .await?;

                tx.commit()
                    .await
                    .map_err(|e| BillingError::Database(e.to_string()))?;

                tracing::info!(
                    ad_id = %ad.id,
                    user_id = %ad.user_id,
                    fee_paise = charge_paise,
                    validity_days = pricing.validity_days,
                    "Ad renewed"
                );

                Ok(RenewalOutcome::Renewed {
                    ad_id: ad.id,
                    fee_paise: charge_paise,
                })
            }
            RenewalDecision::Expire => {
                sqlx::query("UPDATE ads SET status = 'expired', updated_at = $2 WHERE id = $1")
                    .bind(ad.id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                tx.commit()
                    .await
                    .map_err(|e| BillingError::Database(e.to_string()))?;

                tracing::info!(
                    ad_id = %ad.id,
                    user_id = %ad.user_id,
                    required_paise = pricing.fee_paise,
                    available_paise = balance,
                    "Ad expired (insufficient funds for renewal)"
                );

                Ok(RenewalOutcome::Expired { ad_id: ad.id })
            }
        }
    }

    /// Debit (when the fee is non-zero) plus the ad update, inside the
    /// caller's transaction. Renewal resets any promotional plan tag.
    async fn apply_renewal(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ad: &DueAd,
        pricing: &ResolvedPricing,
        charge_paise: i64,
        now: OffsetDateTime,
    ) -> BillingResult<()> {
        if charge_paise > 0 {
            WalletService::debit_in_tx(
                &mut *tx,
                ad.user_id,
                charge_paise,
                TxType::Renewal,
                &format!(
                    "Renewal of '{}' ({})",
                    ad.title,
                    format_rupees(charge_paise)
                ),
                Some(ad.id),
            )
            .await?;
        }

        let expires_at = now + Duration::days(i64::from(pricing.validity_days));

        sqlx::query(
            r#"
            UPDATE ads
            SET expires_at = $2,
                price_paid_paise = $3,
                plan_type = 'standard',
                validity_days = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(ad.id)
        .bind(expires_at)
        .bind(charge_paise)
        .bind(pricing.validity_days)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renews_when_balance_covers_fee() {
        assert_eq!(
            decide_renewal(1500, 1000),
            RenewalDecision::Renew { charge_paise: 1000 }
        );
    }

    #[test]
    fn test_renews_at_exact_balance() {
        assert_eq!(
            decide_renewal(1000, 1000),
            RenewalDecision::Renew { charge_paise: 1000 }
        );
    }

    #[test]
    fn test_zero_fee_renews_even_with_empty_wallet() {
        assert_eq!(
            decide_renewal(0, 0),
            RenewalDecision::Renew { charge_paise: 0 }
        );
    }

    #[test]
    fn test_expires_on_shortfall() {
        assert_eq!(decide_renewal(999, 1000), RenewalDecision::Expire);
    }
}
