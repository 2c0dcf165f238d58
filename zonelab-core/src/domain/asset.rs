//! Traded asset and execution cost conditions.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BacktestError, Result};
use crate::series::TimeSeries;

/// A named price series. Cheap to clone; the series is shared.
#[derive(Debug, Clone)]
pub struct Asset {
    symbol: String,
    series: Arc<TimeSeries>,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, series: Arc<TimeSeries>) -> Self {
        Self {
            symbol: symbol.into(),
            series,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn shared_series(&self) -> Arc<TimeSeries> {
        Arc::clone(&self.series)
    }

    pub fn price_at(&self, t: NaiveDateTime) -> Option<f64> {
        self.series.price_at(t)
    }

    pub fn require_price(&self, t: NaiveDateTime) -> Result<f64> {
        self.series.require_price(t)
    }
}

/// Trading costs applied to every trade.
///
/// - `commission`: flat amount charged once, at entry
/// - `slippage`: fraction of price lost on both entry and exit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub commission: f64,
    pub slippage: f64,
}

impl Conditions {
    pub fn new(commission: f64, slippage: f64) -> Result<Self> {
        if !commission.is_finite() || commission < 0.0 {
            return Err(BacktestError::config(format!(
                "commission must be a non-negative amount, got {commission}"
            )));
        }
        if !slippage.is_finite() || !(0.0..1.0).contains(&slippage) {
            return Err(BacktestError::config(format!(
                "slippage must be a fraction in [0, 1), got {slippage}"
            )));
        }
        Ok(Self {
            commission,
            slippage,
        })
    }

    pub fn zero() -> Self {
        Self {
            commission: 0.0,
            slippage: 0.0,
        }
    }
}

impl Default for Conditions {
    fn default() -> Self {
        Self::zero()
    }
}
