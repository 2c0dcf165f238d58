//! Buy-zone model: intraday momentum entry with target, stop and end-of-day exits.
//!
//! - Buy when flat, no trade has opened yet today, and the price has risen
//!   at least `buy_trigger` above today's opening price.
//! - Sell when in market and any of: the bar is the last of the day, the gain
//!   since entry reaches `sell_trigger`, or the loss since entry reaches
//!   `stop_loss`.
//!
//! All three parameters are non-negative amounts in price units. The model
//! only ever enters long.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::Asset;
use crate::engine::Session;
use crate::error::{BacktestError, Result};
use crate::rules::Rule;

/// The three tunable thresholds, in the order the optimizer searches them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuyZoneParams {
    pub buy_trigger: f64,
    pub sell_trigger: f64,
    pub stop_loss: f64,
}

impl BuyZoneParams {
    pub const DIMENSIONS: usize = 3;

    /// Read `[buy_trigger, sell_trigger, stop_loss]`.
    pub fn from_slice(position: &[f64]) -> Result<Self> {
        match *position {
            [buy_trigger, sell_trigger, stop_loss] => Ok(Self {
                buy_trigger,
                sell_trigger,
                stop_loss,
            }),
            _ => Err(BacktestError::config(format!(
                "buy-zone parameters need {} values, got {}",
                Self::DIMENSIONS,
                position.len()
            ))),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.buy_trigger, self.sell_trigger, self.stop_loss]
    }
}

#[derive(Debug, Clone)]
pub struct BuyZoneModel {
    asset: Asset,
    params: BuyZoneParams,
}

impl BuyZoneModel {
    pub fn new(asset: Asset, params: BuyZoneParams) -> Result<Self> {
        for (name, value) in [
            ("buy_trigger", params.buy_trigger),
            ("sell_trigger", params.sell_trigger),
            ("stop_loss", params.stop_loss),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BacktestError::config(format!(
                    "{name} must be a non-negative amount, got {value}"
                )));
            }
        }
        Ok(Self { asset, params })
    }

    pub fn params(&self) -> BuyZoneParams {
        self.params
    }

    fn traded_today(&self, t: NaiveDateTime, session: &Session) -> bool {
        let today = t.date();
        session.trades().iter().any(|trade| trade.open().date() == today)
    }
}

impl Rule for BuyZoneModel {
    fn name(&self) -> &str {
        "BuyZone"
    }

    fn buy(&self, t: NaiveDateTime, session: &Session) -> bool {
        if session.in_market(t) || self.traded_today(t, session) {
            return false;
        }
        let series = self.asset.series();
        match (series.price_at(t), series.open_on_day(t)) {
            (Some(current), Some(open)) => current - open >= self.params.buy_trigger,
            _ => false,
        }
    }

    fn sell(&self, t: NaiveDateTime, session: &Session) -> bool {
        if !session.in_market(t) {
            return false;
        }
        let Some(entry_time) = session.last_trade().map(|trade| trade.open()) else {
            return false;
        };
        let series = self.asset.series();
        let (Some(entry), Some(current)) = (series.price_at(entry_time), series.price_at(t))
        else {
            return false;
        };

        let end_of_day = series.close_on_day(t).is_some_and(|close| t >= close);
        let target_reached = current - entry >= self.params.sell_trigger;
        let stop_reached = entry - current >= self.params.stop_loss;
        end_of_day || target_reached || stop_reached
    }
}
