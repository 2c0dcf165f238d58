//! Session: the ordered trade list for one backtest and the account it books to.
//!
//! # Invariants
//! - Trades are sorted by open time and never overlap
//! - At most one trade is open, and only as the latest trade
//! - The same trade (by id) is never added twice
//! - Opening debits the purchase price at `open + 1s`; closing credits the
//!   sell price at `close` and records the realized profit

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::domain::{Account, Conditions, Trade, TradeId};
use crate::engine::stats::{RunningStats, SessionStatistics};
use crate::error::{BacktestError, Result};

/// Sharpe ratio reported when no trade has closed yet.
pub const NO_TRADES_SHARPE: f64 = 0.00001;

/// Denominator used when every realized profit is identical.
pub const ZERO_DEVIATION_DENOMINATOR: f64 = 100.0;

/// Offset between a trade's open and its debit, so the debit never lands on
/// the same equity-curve key as an entry written at the open.
fn debit_offset() -> Duration {
    Duration::seconds(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    InMarket,
    Flat,
}

#[derive(Debug, Clone)]
pub struct Session {
    account: Account,
    conditions: Conditions,
    trades: Vec<Trade>,
    profit_curve: Vec<f64>,
    stats: RunningStats,
}

impl Session {
    pub fn new(account: Account, conditions: Conditions) -> Self {
        Self {
            account,
            conditions,
            trades: Vec::new(),
            profit_curve: Vec::new(),
            stats: RunningStats::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.trades.last() {
            None => SessionState::Empty,
            Some(t) if t.is_open() => SessionState::InMarket,
            Some(_) => SessionState::Flat,
        }
    }

    /// Append a trade. An open trade is debited at `open + 1s`; a trade that
    /// is already closed is debited and then credited at its close.
    pub fn add_trade(&mut self, trade: Trade) -> Result<()> {
        if self.trades.iter().any(|t| t.id() == trade.id()) {
            return Err(BacktestError::order(format!(
                "trade {} is already in the session",
                trade.id()
            )));
        }
        if let Some(last) = self.trades.last() {
            match last.close() {
                None => {
                    return Err(BacktestError::order(format!(
                        "cannot add trade {} while trade {} is still open",
                        trade.id(),
                        last.id()
                    )))
                }
                Some(close) if trade.open() < close => {
                    return Err(BacktestError::order(format!(
                        "trade {} opens at {} before the previous close {close}",
                        trade.id(),
                        trade.open()
                    )))
                }
                Some(_) => {}
            }
        }

        let purchase = trade.purchase_price()?;
        let debit_at = trade.open() + debit_offset();
        match trade.close() {
            None => self.account.withdraw(purchase, debit_at)?,
            Some(close) => {
                let sell = trade.sell_price()?;
                let profit = trade.profit()?;
                // Both writes land or neither does.
                let mut staged = self.account.clone();
                staged.withdraw(purchase, debit_at)?;
                staged.profit(sell, close)?;
                self.account = staged;
                self.record_profit(trade.id(), close, sell, profit);
            }
        }
        debug!(
            trade = %trade.id(),
            side = %trade.side(),
            size = trade.size(),
            open = %trade.open(),
            purchase,
            "opened trade"
        );
        self.trades.push(trade);
        Ok(())
    }

    /// Close the open trade at `t`, credit the sell price and record profit.
    /// On failure the trade stays open and the account is untouched.
    pub fn close_last_trade(&mut self, t: NaiveDateTime) -> Result<()> {
        let last = self
            .trades
            .last_mut()
            .ok_or_else(|| BacktestError::order("no trade to close"))?;
        if last.is_closed() {
            return Err(BacktestError::order(format!(
                "trade {} is already closed",
                last.id()
            )));
        }
        let mut closed = last.clone();
        closed.set_close(t)?;
        let sell = closed.sell_price()?;
        let profit = closed.profit()?;

        self.account.profit(sell, t)?;
        *last = closed;
        let id = last.id();
        self.record_profit(id, t, sell, profit);
        Ok(())
    }

    fn record_profit(&mut self, id: TradeId, close: NaiveDateTime, sell: f64, profit: f64) {
        self.profit_curve.push(profit);
        self.stats.push(profit);
        debug!(trade = %id, close = %close, sell, profit, "closed trade");
    }

    // ─── Queries ────────────────────────────────────────────────────────

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn last_trade(&self) -> Option<&Trade> {
        self.trades.last()
    }

    /// The trade whose span includes `t`.
    pub fn trade_at(&self, t: NaiveDateTime) -> Option<&Trade> {
        self.trades.iter().find(|trade| trade.includes_date(t))
    }

    pub fn in_market(&self, t: NaiveDateTime) -> bool {
        self.trades.iter().any(|trade| trade.includes_date(t))
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn into_account(self) -> Account {
        self.account
    }

    pub fn conditions(&self) -> Conditions {
        self.conditions
    }

    /// Realized profit of each closed trade, in close order.
    pub fn profit_curve(&self) -> &[f64] {
        &self.profit_curve
    }

    pub fn gross_profit(&self) -> f64 {
        self.profit_curve.iter().sum()
    }

    /// Mean over standard deviation of realized profits. Not annualized.
    pub fn sharpe_ratio(&self) -> f64 {
        if self.stats.is_empty() {
            return NO_TRADES_SHARPE;
        }
        let sd = self.stats.std_dev();
        let denominator = if sd == 0.0 {
            ZERO_DEVIATION_DENOMINATOR
        } else {
            sd
        };
        self.stats.mean() / denominator
    }

    pub fn statistics(&self) -> SessionStatistics {
        let closed_trades = self.profit_curve.len();
        let winners = self.profit_curve.iter().filter(|p| **p > 0.0).count();
        let losers = self.profit_curve.iter().filter(|p| **p < 0.0).count();
        let win_rate = if closed_trades == 0 {
            0.0
        } else {
            winners as f64 / closed_trades as f64
        };
        SessionStatistics {
            trade_count: self.trades.len(),
            closed_trades,
            winners,
            losers,
            win_rate,
            gross_profit: self.gross_profit(),
            mean_profit: self.stats.mean(),
            profit_std_dev: self.stats.std_dev(),
            sharpe: self.sharpe_ratio(),
            max_drawdown: self.account.max_drawdown(),
            starting_balance: self.account.starting_balance(),
            final_balance: self.account.current_balance(),
        }
    }
}
