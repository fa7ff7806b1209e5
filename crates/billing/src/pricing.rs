//! Category pricing resolution
//!
//! Every category can carry one pricing row (posting fee + validity
//! window). Categories without a row fall back to the system default so
//! that a missing pricing record never blocks a post or a renewal.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BillingResult;

/// Fallback posting fee when a category has no pricing row (₹10).
pub const DEFAULT_FEE_PAISE: i64 = 1000;
/// Fallback validity window when a category has no pricing row.
pub const DEFAULT_VALIDITY_DAYS: i32 = 30;

/// The pricing in effect for a category at resolution time.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPricing {
    pub fee_paise: i64,
    pub validity_days: i32,
    pub pricing_type: String,
}

impl ResolvedPricing {
    /// The system default applied when no pricing row exists.
    pub fn system_default() -> Self {
        Self {
            fee_paise: DEFAULT_FEE_PAISE,
            validity_days: DEFAULT_VALIDITY_DAYS,
            pricing_type: "standard".to_string(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PricingRow {
    fee_paise: i64,
    validity_days: i32,
    pricing_type: String,
}

/// Read-only resolver over the `category_pricing` table.
#[derive(Clone)]
pub struct PricingResolver {
    pool: PgPool,
}

impl PricingResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the current fee and validity window for a category.
    ///
    /// Absent pricing is not an error: the system default applies and the
    /// occurrence is logged. Pure read, no side effects.
    pub async fn resolve(&self, category_id: Uuid) -> BillingResult<ResolvedPricing> {
        let row: Option<PricingRow> = sqlx::query_as(
            r#"
            SELECT fee_paise, validity_days, pricing_type
            FROM category_pricing
            WHERE category_id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(ResolvedPricing {
                fee_paise: row.fee_paise,
                validity_days: row.validity_days,
                pricing_type: row.pricing_type,
            }),
            None => {
                tracing::warn!(
                    category_id = %category_id,
                    "No pricing row for category, using system default"
                );
                Ok(ResolvedPricing::system_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_default_pricing() {
        let pricing = ResolvedPricing::system_default();
        assert_eq!(pricing.fee_paise, 1000);
        assert_eq!(pricing.validity_days, 30);
        assert_eq!(pricing.pricing_type, "standard");
    }
}
