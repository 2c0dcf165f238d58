//! Error taxonomy for the backtesting core.
//!
//! Every fallible operation in the engine returns [`BacktestError`]. The
//! simulation fails fast: nothing in this crate catches and continues.

use thiserror::Error;

/// Errors raised by the series, ledger, session and sizing layers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    /// A timestamp was missing, duplicated, out of order, or a trade was
    /// queried in a state that does not support the query.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// A trade would break the strict chronological ordering of a session.
    #[error("invalid trade order: {0}")]
    InvalidTradeOrder(String),

    /// A debit would take the account below zero.
    #[error("account is overdrawn: balance {balance:.2}, requested {requested:.2}")]
    InsufficientFunds { balance: f64, requested: f64 },

    /// A component was constructed with parameters outside its domain.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BacktestError {
    pub fn data(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn order(msg: impl Into<String>) -> Self {
        Self::InvalidTradeOrder(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overdraft_message_includes_amounts() {
        let err = BacktestError::InsufficientFunds {
            balance: 9.0,
            requested: 11.5,
        };
        assert_eq!(
            err.to_string(),
            "account is overdrawn: balance 9.00, requested 11.50"
        );
    }

    #[test]
    fn helpers_pick_the_right_variant() {
        assert!(matches!(BacktestError::data("x"), BacktestError::DataIntegrity(_)));
        assert!(matches!(BacktestError::order("x"), BacktestError::InvalidTradeOrder(_)));
        assert!(matches!(BacktestError::config("x"), BacktestError::Configuration(_)));
    }
}
