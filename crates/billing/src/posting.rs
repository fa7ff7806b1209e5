//! Posting allowance tracking
//!
//! Decides whether a new ad posts free, charges the wallet, or is blocked,
//! and performs the posting itself. The decision order is fixed:
//! membership bypass, then the lifetime free-ad allowance, then the
//! resolved category fee against the wallet.
//!
//! A chargeable post debits the wallet and creates the ad in one
//! transaction: never a debit without an ad, never a paid ad without a
//! debit.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::pricing::{PricingResolver, ResolvedPricing};
use crate::wallet::{format_rupees, TxType, WalletService};

/// Lifetime free-ad allowance per user.
///
/// The posting gate is the source of truth for this number; promotional
/// copy elsewhere in the product has disagreed with it before.
pub const FREE_AD_LIMIT: i32 = 5;

/// The monetizable slice of a user row, read under the row lock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSnapshot {
    pub wallet_balance_paise: i64,
    pub free_ads_used: i32,
    pub membership_expires_at: Option<OffsetDateTime>,
}

/// Outcome of the posting decision policy. `decide_posting` is pure so the
/// policy table can be tested without a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostingDecision {
    /// Active membership: free and unlimited, category fee bypassed.
    MembershipFree,
    /// Within the lifetime free-ad allowance; the counter increments.
    FreeAllowance,
    /// The category itself is priced free; wallet never consulted.
    FreeCategory,
    /// Wallet charge at the resolved category fee.
    Charge { fee_paise: i64 },
    /// Balance below the fee; the post must not happen.
    Blocked {
        required_paise: i64,
        available_paise: i64,
    },
}

/// Evaluate the posting policy against a locked user snapshot.
pub fn decide_posting(
    user: &UserSnapshot,
    pricing: &ResolvedPricing,
    now: OffsetDateTime,
) -> PostingDecision {
    if let Some(expiry) = user.membership_expires_at {
        if expiry > now {
            return PostingDecision::MembershipFree;
        }
    }

    if user.free_ads_used < FREE_AD_LIMIT {
        return PostingDecision::FreeAllowance;
    }

    if pricing.fee_paise == 0 {
        return PostingDecision::FreeCategory;
    }

    if user.wallet_balance_paise >= pricing.fee_paise {
        PostingDecision::Charge {
            fee_paise: pricing.fee_paise,
        }
    } else {
        PostingDecision::Blocked {
            required_paise: pricing.fee_paise,
            available_paise: user.wallet_balance_paise,
        }
    }
}

/// Boundary view of the posting decision for the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct PostingQuote {
    pub allowed: bool,
    pub charge_paise: i64,
    pub reason: &'static str,
    /// Amount the user must top up when blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall_paise: Option<i64>,
}

impl From<&PostingDecision> for PostingQuote {
    fn from(decision: &PostingDecision) -> Self {
        match decision {
            PostingDecision::MembershipFree => PostingQuote {
                allowed: true,
                charge_paise: 0,
                reason: "membership",
                shortfall_paise: None,
            },
            PostingDecision::FreeAllowance => PostingQuote {
                allowed: true,
                charge_paise: 0,
                reason: "free-allowance",
                shortfall_paise: None,
            },
            PostingDecision::FreeCategory => PostingQuote {
                allowed: true,
                charge_paise: 0,
                reason: "free-category",
                shortfall_paise: None,
            },
            PostingDecision::Charge { fee_paise } => PostingQuote {
                allowed: true,
                charge_paise: *fee_paise,
                reason: "wallet-charge",
                shortfall_paise: None,
            },
            PostingDecision::Blocked {
                required_paise,
                available_paise,
            } => PostingQuote {
                allowed: false,
                charge_paise: *required_paise,
                reason: "insufficient-funds",
                shortfall_paise: Some(required_paise - available_paise),
            },
        }
    }
}

/// Input for a new listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAd {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub asking_price_paise: i64,
}

/// A created listing, as returned to the caller.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ad {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub asking_price_paise: i64,
    pub status: String,
    pub price_paid_paise: i64,
    pub plan_type: String,
    pub validity_days: i32,
    pub expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Posting operations: quote + post.
#[derive(Clone)]
pub struct PostingService {
    pool: PgPool,
    pricing: PricingResolver,
}

impl PostingService {
    pub fn new(pool: PgPool) -> Self {
        let pricing = PricingResolver::new(pool.clone());
        Self { pool, pricing }
    }

    /// Non-binding posting quote for a user. With no category the system
    /// default pricing is assumed.
    pub async fn quote(
        &self,
        user_id: Uuid,
        category_id: Option<Uuid>,
    ) -> BillingResult<PostingQuote> {
        let pricing = match category_id {
            Some(id) => self.pricing.resolve(id).await?,
            None => ResolvedPricing::system_default(),
        };

        let user: Option<UserSnapshot> = sqlx::query_as(
            r#"
            SELECT wallet_balance_paise, free_ads_used, membership_expires_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let user = user.ok_or_else(|| BillingError::NotFound(format!("user {}", user_id)))?;
        let decision = decide_posting(&user, &pricing, OffsetDateTime::now_utc());
        Ok(PostingQuote::from(&decision))
    }

    /// Post a new ad, applying the allowance policy.
    ///
    /// The allowance check, any free-counter increment or wallet debit, and
    /// the ad insert commit as one transaction under the user row lock. A
    /// blocked post returns `InsufficientFunds` and commits nothing.
    pub async fn post_ad(&self, new_ad: NewAd) -> BillingResult<Ad> {
        // Pricing is a non-financial read; a missing row falls back to the
        // default and must not hold the user lock.
        let pricing = self.pricing.resolve(new_ad.category_id).await?;
        let now = OffsetDateTime::now_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        let user: Option<UserSnapshot> = sqlx::query_as(
            r#"
            SELECT wallet_balance_paise, free_ads_used, membership_expires_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(new_ad.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let user =
            user.ok_or_else(|| BillingError::NotFound(format!("user {}", new_ad.user_id)))?;

        let decision = decide_posting(&user, &pricing, now);

        let charge_paise = match decision {
            PostingDecision::Blocked {
                required_paise,
                available_paise,
            } => {
                // Transaction dropped without commit.
                return Err(BillingError::InsufficientFunds {
                    required_paise,
                    available_paise,
                });
            }
            PostingDecision::MembershipFree | PostingDecision::FreeCategory => 0,
            PostingDecision::FreeAllowance => {
                sqlx::query("UPDATE users SET free_ads_used = free_ads_used + 1 WHERE id = $1")
                    .bind(new_ad.user_id)
                    .execute(&mut *tx)
                    .await?;
                0
            }
            PostingDecision::Charge { fee_paise } => fee_paise,
        };

        let expires_at = now + Duration::days(i64::from(pricing.validity_days));

        let ad: Ad = sqlx::query_as(
            r#"
            INSERT INTO ads (user_id, category_id, title, asking_price_paise, status,
                             price_paid_paise, plan_type, validity_days, expires_at)
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8)
            RETURNING id, user_id, category_id, title, asking_price_paise, status,
                      price_paid_paise, plan_type, validity_days, expires_at, created_at
            "#,
        )
        .bind(new_ad.user_id)
        .bind(new_ad.category_id)
        .bind(&new_ad.title)
        .bind(new_ad.asking_price_paise)
        .bind(charge_paise)
        .bind(&pricing.pricing_type)
        .bind(pricing.validity_days)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        if charge_paise > 0 {
            WalletService::debit_in_tx(
                &mut tx,
                new_ad.user_id,
                charge_paise,
                TxType::PostingFee,
                &format!(
                    "Posting fee for '{}' ({})",
                    ad.title,
                    format_rupees(charge_paise)
                ),
                Some(ad.id),
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        tracing::info!(
            user_id = %new_ad.user_id,
            ad_id = %ad.id,
            category_id = %new_ad.category_id,
            charge_paise = charge_paise,
            expires_at = %expires_at,
            "Ad posted"
        );

        Ok(ad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(balance: i64, free_used: i32, membership: Option<OffsetDateTime>) -> UserSnapshot {
        UserSnapshot {
            wallet_balance_paise: balance,
            free_ads_used: free_used,
            membership_expires_at: membership,
        }
    }

    fn pricing(fee_paise: i64) -> ResolvedPricing {
        ResolvedPricing {
            fee_paise,
            validity_days: 30,
            pricing_type: "standard".to_string(),
        }
    }

    #[test]
    fn test_membership_bypasses_everything() {
        let now = OffsetDateTime::now_utc();
        let user = snapshot(0, 99, Some(now + Duration::days(10)));
        assert_eq!(
            decide_posting(&user, &pricing(50_000), now),
            PostingDecision::MembershipFree
        );
    }

    #[test]
    fn test_expired_membership_does_not_bypass() {
        let now = OffsetDateTime::now_utc();
        let user = snapshot(0, FREE_AD_LIMIT, Some(now - Duration::days(1)));
        assert!(matches!(
            decide_posting(&user, &pricing(1000), now),
            PostingDecision::Blocked { .. }
        ));
    }

    #[test]
    fn test_free_allowance_before_limit() {
        let now = OffsetDateTime::now_utc();
        for used in 0..FREE_AD_LIMIT {
            let user = snapshot(0, used, None);
            assert_eq!(
                decide_posting(&user, &pricing(1000), now),
                PostingDecision::FreeAllowance,
                "ad #{} should be free",
                used + 1
            );
        }
    }

    #[test]
    fn test_charge_after_allowance_exhausted() {
        let now = OffsetDateTime::now_utc();
        let user = snapshot(2500, FREE_AD_LIMIT, None);
        assert_eq!(
            decide_posting(&user, &pricing(1000), now),
            PostingDecision::Charge { fee_paise: 1000 }
        );
    }

    #[test]
    fn test_zero_fee_category_never_consults_wallet() {
        let now = OffsetDateTime::now_utc();
        let user = snapshot(0, FREE_AD_LIMIT, None);
        assert_eq!(
            decide_posting(&user, &pricing(0), now),
            PostingDecision::FreeCategory
        );
    }

    #[test]
    fn test_blocked_reports_both_sides() {
        let now = OffsetDateTime::now_utc();
        let user = snapshot(300, FREE_AD_LIMIT, None);
        let decision = decide_posting(&user, &pricing(1000), now);
        assert_eq!(
            decision,
            PostingDecision::Blocked {
                required_paise: 1000,
                available_paise: 300
            }
        );

        let quote = PostingQuote::from(&decision);
        assert!(!quote.allowed);
        assert_eq!(quote.reason, "insufficient-funds");
        assert_eq!(quote.shortfall_paise, Some(700));
    }

    #[test]
    fn test_exact_balance_is_allowed() {
        let now = OffsetDateTime::now_utc();
        let user = snapshot(1000, FREE_AD_LIMIT, None);
        assert_eq!(
            decide_posting(&user, &pricing(1000), now),
            PostingDecision::Charge { fee_paise: 1000 }
        );
    }
}
