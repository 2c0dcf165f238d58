//! Running statistics over realized trade profits.

use serde::{Deserialize, Serialize};

/// Welford accumulator for mean and sample variance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n - 1 denominator). Zero with fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Summary of a finished session, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub trade_count: usize,
    pub closed_trades: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub mean_profit: f64,
    pub profit_std_dev: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub starting_balance: f64,
    pub final_balance: f64,
}
