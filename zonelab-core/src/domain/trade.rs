//! A single position: open or closed, long or short.
//!
//! Cost model:
//! - purchase price = `(open_price + open_price * slippage) * size + commission`
//! - sell price = `(close_price - close_price * slippage) * size`
//! - profit = sell - purchase (long) or purchase - sell (short)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::asset::{Asset, Conditions};
use crate::domain::ids::TradeId;
use crate::error::{BacktestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trade {
    id: TradeId,
    asset: Asset,
    open: NaiveDateTime,
    close: Option<NaiveDateTime>,
    size: u32,
    side: TradeSide,
    conditions: Conditions,
}

impl Trade {
    /// Create a trade. Both timestamps must exist in the asset's series and a
    /// close, if given, must be strictly after the open.
    pub fn new(
        asset: Asset,
        open: NaiveDateTime,
        close: Option<NaiveDateTime>,
        size: u32,
        side: TradeSide,
        conditions: Conditions,
    ) -> Result<Self> {
        if size == 0 {
            return Err(BacktestError::data("trade size must be at least one share"));
        }
        if !asset.series().has_price_at(open) {
            return Err(BacktestError::data(format!(
                "cannot open a trade at {open}: no price recorded"
            )));
        }
        if let Some(c) = close {
            if !asset.series().has_price_at(c) {
                return Err(BacktestError::data(format!(
                    "cannot close a trade at {c}: no price recorded"
                )));
            }
            if c <= open {
                return Err(BacktestError::data(format!(
                    "close {c} must come after open {open}"
                )));
            }
        }
        Ok(Self {
            id: TradeId::next(),
            asset,
            open,
            close,
            size,
            side,
            conditions,
        })
    }

    /// One-share open long trade with no costs.
    pub fn open_long(asset: Asset, open: NaiveDateTime) -> Result<Self> {
        Self::new(asset, open, None, 1, TradeSide::Long, Conditions::zero())
    }

    /// Closed long trade with no costs.
    pub fn closed_long(
        asset: Asset,
        open: NaiveDateTime,
        close: NaiveDateTime,
        size: u32,
    ) -> Result<Self> {
        Self::new(asset, open, Some(close), size, TradeSide::Long, Conditions::zero())
    }

    pub fn id(&self) -> TradeId {
        self.id
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn open(&self) -> NaiveDateTime {
        self.open
    }

    pub fn close(&self) -> Option<NaiveDateTime> {
        self.close
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    pub fn conditions(&self) -> Conditions {
        self.conditions
    }

    pub fn is_open(&self) -> bool {
        self.close.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_some()
    }

    /// Close the trade at `close`, which must be a recorded timestamp after
    /// the open.
    pub fn set_close(&mut self, close: NaiveDateTime) -> Result<()> {
        if close <= self.open {
            return Err(BacktestError::data(format!(
                "trade must close after its open {}, got {close}",
                self.open
            )));
        }
        if !self.asset.series().has_price_at(close) {
            return Err(BacktestError::data(format!(
                "cannot close a trade at {close}: no price recorded"
            )));
        }
        self.close = Some(close);
        Ok(())
    }

    /// Closed trades cover `[open, close)`; open trades cover every `t >= open`.
    pub fn includes_date(&self, t: NaiveDateTime) -> bool {
        match self.close {
            Some(close) => self.open <= t && t < close,
            None => self.open <= t,
        }
    }

    pub fn open_price(&self) -> Result<f64> {
        self.asset.require_price(self.open)
    }

    pub fn close_price(&self) -> Result<f64> {
        let close = self.require_close("close price")?;
        self.asset.require_price(close)
    }

    pub fn purchase_price(&self) -> Result<f64> {
        let open = self.open_price()?;
        let per_share = open + open * self.conditions.slippage;
        Ok(per_share * f64::from(self.size) + self.conditions.commission)
    }

    pub fn sell_price(&self) -> Result<f64> {
        let close = self.close_price()?;
        let per_share = close - close * self.conditions.slippage;
        Ok(per_share * f64::from(self.size))
    }

    pub fn profit(&self) -> Result<f64> {
        self.require_close("profit")?;
        let sell = self.sell_price()?;
        let purchase = self.purchase_price()?;
        Ok(match self.side {
            TradeSide::Long => sell - purchase,
            TradeSide::Short => purchase - sell,
        })
    }

    fn require_close(&self, what: &str) -> Result<NaiveDateTime> {
        self.close.ok_or_else(|| {
            BacktestError::data(format!("cannot compute {what} of open trade {}", self.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;
    use chrono::{Duration, NaiveDate};
    use std::sync::Arc;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn asset(prices: &[f64]) -> Asset {
        let series = TimeSeries::from_points(
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| (t0() + Duration::days(i as i64), *p)),
        )
        .unwrap();
        Asset::new("TEST", Arc::new(series))
    }

    fn day(n: i64) -> NaiveDateTime {
        t0() + Duration::days(n)
    }

    fn assert_approx(actual: f64, expected: f64, eps: f64) {
        assert!(
            (actual - expected).abs() < eps,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn rejects_timestamps_outside_series() {
        let a = asset(&[10.0, 11.0]);
        assert!(Trade::open_long(a.clone(), day(5)).is_err());
        assert!(Trade::closed_long(a, day(0), day(5), 1).is_err());
    }

    #[test]
    fn rejects_close_not_after_open() {
        let a = asset(&[10.0, 11.0]);
        assert!(Trade::closed_long(a.clone(), day(1), day(0), 1).is_err());
        assert!(Trade::closed_long(a, day(1), day(1), 1).is_err());
    }

    #[test]
    fn rejects_zero_size() {
        let a = asset(&[10.0, 11.0]);
        assert!(Trade::closed_long(a, day(0), day(1), 0).is_err());
    }

    #[test]
    fn set_close_must_follow_open() {
        let a = asset(&[10.0, 11.0, 12.0]);
        let mut trade = Trade::open_long(a, day(1)).unwrap();
        assert!(trade.set_close(day(0)).is_err());
        assert!(trade.set_close(day(1)).is_err());
        assert!(trade.is_open());
        trade.set_close(day(2)).unwrap();
        assert_eq!(trade.close(), Some(day(2)));
    }

    #[test]
    fn includes_date_is_half_open() {
        let a = asset(&[1.0, 2.0, 3.0, 4.0]);
        let closed = Trade::closed_long(a.clone(), day(1), day(3), 1).unwrap();
        assert!(!closed.includes_date(day(0)));
        assert!(closed.includes_date(day(1)));
        assert!(closed.includes_date(day(2)));
        assert!(!closed.includes_date(day(3)));

        let open = Trade::open_long(a, day(1)).unwrap();
        assert!(!open.includes_date(day(0)));
        assert!(open.includes_date(day(3)));
    }

    #[test]
    fn long_profit_without_costs() {
        let a = asset(&[10.0, 12.0]);
        let trade = Trade::closed_long(a, day(0), day(1), 3).unwrap();
        assert_approx(trade.profit().unwrap(), 6.0, 1e-12);
    }

    #[test]
    fn short_profit_is_inverted() {
        let a = asset(&[10.0, 12.0]);
        let trade = Trade::new(
            a,
            day(0),
            Some(day(1)),
            3,
            TradeSide::Short,
            Conditions::zero(),
        )
        .unwrap();
        assert_approx(trade.profit().unwrap(), -6.0, 1e-12);
    }

    #[test]
    fn costs_apply_to_purchase_and_sell() {
        let a = asset(&[100.0, 110.0]);
        let conditions = Conditions::new(10.0, 0.01).unwrap();
        let trade =
            Trade::new(a, day(0), Some(day(1)), 2, TradeSide::Long, conditions).unwrap();
        // (100 + 1) * 2 + 10 = 212
        assert_approx(trade.purchase_price().unwrap(), 212.0, 1e-9);
        // (110 - 1.1) * 2 = 217.8
        assert_approx(trade.sell_price().unwrap(), 217.8, 1e-9);
        assert_approx(trade.profit().unwrap(), 5.8, 1e-9);
    }

    #[test]
    fn open_trade_has_no_profit() {
        let a = asset(&[10.0, 12.0]);
        let trade = Trade::open_long(a, day(0)).unwrap();
        assert!(matches!(
            trade.profit(),
            Err(BacktestError::DataIntegrity(_))
        ));
        assert!(trade.sell_price().is_err());
    }

    #[test]
    fn clone_keeps_identity() {
        let a = asset(&[10.0, 12.0]);
        let trade = Trade::open_long(a, day(0)).unwrap();
        assert_eq!(trade.clone().id(), trade.id());
    }
}
