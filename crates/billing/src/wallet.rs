//! Wallet ledger
//!
//! The single source of truth for a user's spendable balance. Every
//! mutation of `users.wallet_balance_paise` happens here and nowhere else,
//! always paired with exactly one `wallet_transactions` row in the same
//! database transaction. That pairing is what keeps the reconciliation
//! invariant (`SUM(ledger) == balance`) checkable at any time.
//!
//! Amounts are integer paise throughout. Ledger rows are signed: credits
//! positive, debits negative. The ledger is append-only.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// Ledger entry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxType {
    Topup,
    PostingFee,
    Renewal,
    ReferralBonus,
    Membership,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Topup => "topup",
            TxType::PostingFee => "posting-fee",
            TxType::Renewal => "renewal",
            TxType::ReferralBonus => "referral-bonus",
            TxType::Membership => "membership",
        }
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Signed amount: positive credit, negative debit.
    pub amount_paise: i64,
    pub tx_type: String,
    pub description: String,
    pub ad_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

/// Format paise as a rupee string for descriptions and logs.
pub fn format_rupees(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let paise = paise.abs();
    format!("{}₹{}.{:02}", sign, paise / 100, paise % 100)
}

/// Wallet operations over the `users` + `wallet_transactions` tables.
#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
}

impl WalletService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Credit the wallet in its own transaction. Returns the new balance.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount_paise: i64,
        tx_type: TxType,
        description: &str,
        ad_id: Option<Uuid>,
    ) -> BillingResult<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        let new_balance =
            Self::credit_in_tx(&mut tx, user_id, amount_paise, tx_type, description, ad_id).await?;

        tx.commit()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        tracing::info!(
            user_id = %user_id,
            amount_paise = amount_paise,
            tx_type = tx_type.as_str(),
            new_balance_paise = new_balance,
            "Wallet credited"
        );

        Ok(new_balance)
    }

    /// Debit the wallet in its own transaction. Returns the new balance, or
    /// `InsufficientFunds` with nothing committed.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount_paise: i64,
        tx_type: TxType,
        description: &str,
        ad_id: Option<Uuid>,
    ) -> BillingResult<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        let new_balance =
            Self::debit_in_tx(&mut tx, user_id, amount_paise, tx_type, description, ad_id).await?;

        tx.commit()
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        tracing::info!(
            user_id = %user_id,
            amount_paise = amount_paise,
            tx_type = tx_type.as_str(),
            new_balance_paise = new_balance,
            "Wallet debited"
        );

        Ok(new_balance)
    }

    /// Credit inside a caller-owned transaction.
    ///
    /// Used when the credit must commit together with other writes (payment
    /// recording). Locks the user row, increments the balance and appends
    /// the ledger entry as one unit.
    pub async fn credit_in_tx(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount_paise: i64,
        tx_type: TxType,
        description: &str,
        ad_id: Option<Uuid>,
    ) -> BillingResult<i64> {
        if amount_paise <= 0 {
            return Err(BillingError::InvalidAmount(amount_paise));
        }

        let balance = Self::lock_balance(conn, user_id).await?;
        let new_balance = balance + amount_paise;

        Self::write_balance_and_ledger(
            conn,
            user_id,
            new_balance,
            amount_paise,
            tx_type,
            description,
            ad_id,
        )
        .await?;

        Ok(new_balance)
    }

    /// Debit inside a caller-owned transaction.
    ///
    /// Used when the debit must commit together with other writes (ad
    /// creation, renewal). Fails with `InsufficientFunds` before any write
    /// when the locked balance is below the amount.
    pub async fn debit_in_tx(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount_paise: i64,
        tx_type: TxType,
        description: &str,
        ad_id: Option<Uuid>,
    ) -> BillingResult<i64> {
        if amount_paise <= 0 {
            return Err(BillingError::InvalidAmount(amount_paise));
        }

        let balance = Self::lock_balance(conn, user_id).await?;
        if balance < amount_paise {
            return Err(BillingError::InsufficientFunds {
                required_paise: amount_paise,
                available_paise: balance,
            });
        }
        let new_balance = balance - amount_paise;

        Self::write_balance_and_ledger(
            conn,
            user_id,
            new_balance,
            -amount_paise,
            tx_type,
            description,
            ad_id,
        )
        .await?;

        Ok(new_balance)
    }

    /// Current balance in paise.
    pub async fn balance(&self, user_id: Uuid) -> BillingResult<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT wallet_balance_paise FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        balance.ok_or_else(|| BillingError::NotFound(format!("user {}", user_id)))
    }

    /// Most recent ledger entries, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> BillingResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, user_id, amount_paise, tx_type, description, ad_id, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Take the per-user row lock and read the balance under it.
    ///
    /// Serializes all balance-affecting operations for one user without any
    /// cross-user coordination.
    async fn lock_balance(conn: &mut PgConnection, user_id: Uuid) -> BillingResult<i64> {
        let balance: Option<(i64,)> =
            sqlx::query_as("SELECT wallet_balance_paise FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;

        balance
            .map(|(b,)| b)
            .ok_or_else(|| BillingError::NotFound(format!("user {}", user_id)))
    }

    /// The paired write: balance update + ledger append. Callers hold the
    /// row lock and the transaction; `signed_amount` carries the sign.
    async fn write_balance_and_ledger(
        conn: &mut PgConnection,
        user_id: Uuid,
        new_balance: i64,
        signed_amount: i64,
        tx_type: TxType,
        description: &str,
        ad_id: Option<Uuid>,
    ) -> BillingResult<()> {
        sqlx::query("UPDATE users SET wallet_balance_paise = $1 WHERE id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (user_id, amount_paise, tx_type, description, ad_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(signed_amount)
        .bind(tx_type.as_str())
        .bind(description)
        .bind(ad_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_type_strings() {
        assert_eq!(TxType::Topup.as_str(), "topup");
        assert_eq!(TxType::PostingFee.as_str(), "posting-fee");
        assert_eq!(TxType::Renewal.as_str(), "renewal");
        assert_eq!(TxType::ReferralBonus.as_str(), "referral-bonus");
        assert_eq!(TxType::Membership.as_str(), "membership");
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(1000), "₹10.00");
        assert_eq!(format_rupees(1525), "₹15.25");
        assert_eq!(format_rupees(5), "₹0.05");
        assert_eq!(format_rupees(0), "₹0.00");
        assert_eq!(format_rupees(-1000), "-₹10.00");
    }
}
