//! Error types for the billing engine

use thiserror::Error;

/// Errors raised by billing operations.
///
/// Financial operations are transactional: any of these returned from a
/// mutating call means nothing was committed.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Wallet balance is below the required charge. Carries both sides so
    /// callers can tell the user exactly how much to top up.
    #[error("insufficient funds: required {required_paise} paise, available {available_paise} paise")]
    InsufficientFunds {
        required_paise: i64,
        available_paise: i64,
    },

    /// A ledger mutation was attempted with a non-positive amount.
    #[error("invalid amount: {0} paise")]
    InvalidAmount(i64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Database(e.to_string())
    }
}

impl BillingError {
    /// Shortfall in paise for an `InsufficientFunds` error, `None` otherwise.
    pub fn shortfall_paise(&self) -> Option<i64> {
        match self {
            BillingError::InsufficientFunds {
                required_paise,
                available_paise,
            } => Some(required_paise - available_paise),
            _ => None,
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall_only_for_insufficient_funds() {
        let err = BillingError::InsufficientFunds {
            required_paise: 1000,
            available_paise: 250,
        };
        assert_eq!(err.shortfall_paise(), Some(750));

        assert_eq!(BillingError::InvalidAmount(-5).shortfall_paise(), None);
    }
}
