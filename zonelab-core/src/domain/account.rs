//! Equity ledger for a single backtest.
//!
//! Every balance change appends one entry to the equity curve. Entries are
//! strictly increasing in time and the balance never goes below zero.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::error::{BacktestError, Result};

#[derive(Debug, Clone)]
pub struct Account {
    equity_curve: BTreeMap<NaiveDateTime, f64>,
    starting_balance: f64,
}

impl Account {
    /// Open an account with `starting_balance` recorded at `opened_at`.
    pub fn new(starting_balance: f64, opened_at: NaiveDateTime) -> Result<Self> {
        if !starting_balance.is_finite() || starting_balance < 0.0 {
            return Err(BacktestError::config(format!(
                "starting balance must be a non-negative amount, got {starting_balance}"
            )));
        }
        let mut equity_curve = BTreeMap::new();
        equity_curve.insert(opened_at, starting_balance);
        Ok(Self {
            equity_curve,
            starting_balance,
        })
    }

    pub fn starting_balance(&self) -> f64 {
        self.starting_balance
    }

    /// Balance at the latest equity-curve entry.
    pub fn current_balance(&self) -> f64 {
        self.equity_curve
            .values()
            .next_back()
            .copied()
            .unwrap_or(self.starting_balance)
    }

    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.equity_curve.keys().next_back().copied()
    }

    /// Balance recorded exactly at `t`, if any.
    pub fn value_at(&self, t: NaiveDateTime) -> Option<f64> {
        self.equity_curve.get(&t).copied()
    }

    pub fn equity_curve(&self) -> &BTreeMap<NaiveDateTime, f64> {
        &self.equity_curve
    }

    /// Credit `amount` at `t`.
    pub fn profit(&mut self, amount: f64, t: NaiveDateTime) -> Result<()> {
        self.check_amount(amount)?;
        let balance = self.current_balance() + amount;
        self.write(t, balance)
    }

    /// Debit `amount` at `t`. Fails without changing state if the balance
    /// would go negative.
    pub fn lose(&mut self, amount: f64, t: NaiveDateTime) -> Result<()> {
        self.check_amount(amount)?;
        let balance = self.current_balance();
        if balance - amount < 0.0 {
            return Err(BacktestError::InsufficientFunds {
                balance,
                requested: amount,
            });
        }
        self.write(t, balance - amount)
    }

    pub fn withdraw(&mut self, amount: f64, t: NaiveDateTime) -> Result<()> {
        self.lose(amount, t)
    }

    /// Largest peak-to-trough decline of the equity curve, as a fraction of the
    /// peak. Zero for a curve that never falls.
    pub fn max_drawdown(&self) -> f64 {
        let mut peak = f64::MIN;
        let mut worst = 0.0_f64;
        for &balance in self.equity_curve.values() {
            peak = peak.max(balance);
            if peak > 0.0 {
                worst = worst.max((peak - balance) / peak);
            }
        }
        worst
    }

    fn check_amount(&self, amount: f64) -> Result<()> {
        if amount.is_finite() {
            Ok(())
        } else {
            Err(BacktestError::data(format!("non-finite ledger amount {amount}")))
        }
    }

    fn write(&mut self, t: NaiveDateTime, balance: f64) -> Result<()> {
        if self.equity_curve.contains_key(&t) {
            return Err(BacktestError::data(format!(
                "equity curve already has an entry at {t}"
            )));
        }
        if let Some(latest) = self.latest_timestamp() {
            if t < latest {
                return Err(BacktestError::data(format!(
                    "equity entry at {t} precedes latest entry {latest}"
                )));
            }
        }
        self.equity_curve.insert(t, balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(n)
    }

    #[test]
    fn starts_with_one_entry() {
        let account = Account::new(100.0, t(0)).unwrap();
        assert_eq!(account.current_balance(), 100.0);
        assert_eq!(account.equity_curve().len(), 1);
        assert_eq!(account.value_at(t(0)), Some(100.0));
    }

    #[test]
    fn profit_and_lose_append_entries() {
        let mut account = Account::new(100.0, t(0)).unwrap();
        account.lose(30.0, t(1)).unwrap();
        account.profit(5.0, t(2)).unwrap();
        assert_eq!(account.current_balance(), 75.0);
        assert_eq!(account.value_at(t(1)), Some(70.0));
        assert_eq!(account.equity_curve().len(), 3);
    }

    #[test]
    fn overdraft_fails_and_leaves_state() {
        let mut account = Account::new(10.0, t(0)).unwrap();
        let err = account.withdraw(10.01, t(1)).unwrap_err();
        assert!(matches!(err, BacktestError::InsufficientFunds { .. }));
        assert_eq!(account.current_balance(), 10.0);
        assert_eq!(account.equity_curve().len(), 1);
    }

    #[test]
    fn withdrawing_everything_is_allowed() {
        let mut account = Account::new(10.0, t(0)).unwrap();
        account.withdraw(10.0, t(1)).unwrap();
        assert_eq!(account.current_balance(), 0.0);
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let mut account = Account::new(100.0, t(0)).unwrap();
        account.profit(1.0, t(1)).unwrap();
        let err = account.profit(1.0, t(1)).unwrap_err();
        assert!(matches!(err, BacktestError::DataIntegrity(_)));
        assert_eq!(account.current_balance(), 101.0);
    }

    #[test]
    fn earlier_timestamp_rejected() {
        let mut account = Account::new(100.0, t(5)).unwrap();
        assert!(account.profit(1.0, t(4)).is_err());
    }

    #[test]
    fn negative_starting_balance_rejected() {
        assert!(Account::new(-1.0, t(0)).is_err());
    }

    #[test]
    fn max_drawdown_tracks_worst_decline() {
        let mut account = Account::new(100.0, t(0)).unwrap();
        account.profit(100.0, t(1)).unwrap(); // 200
        account.lose(50.0, t(2)).unwrap(); // 150
        account.profit(10.0, t(3)).unwrap(); // 160
        assert!((account.max_drawdown() - 0.25).abs() < 1e-12);
    }
}
