//! Fitness: turns a buy-zone backtest into a score the swarm can minimize.
//!
//! [`FitnessMetric`] picks which session statistic is optimized. The swarm
//! minimizes, so the fitness of a session is the negated metric.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use zonelab_core::domain::{Account, Asset, Conditions};
use zonelab_core::engine::{Session, SessionStatistics, SignalContext};
use zonelab_core::rules::{BuyZoneModel, BuyZoneParams, Rule};
use zonelab_core::sizers::FixedFractionSizer;
use zonelab_core::BacktestError;

use crate::swarm::FitnessFunction;

/// Which statistic to optimize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    GrossProfit,
    WinRate,
}

impl FitnessMetric {
    /// Extract the relevant value from a session summary.
    pub fn extract(&self, stats: &SessionStatistics) -> f64 {
        match self {
            Self::Sharpe => stats.sharpe,
            Self::GrossProfit => stats.gross_profit,
            Self::WinRate => stats.win_rate,
        }
    }

    /// Score to minimize: the negated metric.
    pub fn fitness(&self, session: &Session) -> f64 {
        -self.extract(&session.statistics())
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sharpe => "sharpe",
            Self::GrossProfit => "gross_profit",
            Self::WinRate => "win_rate",
        };
        f.write_str(name)
    }
}

/// A candidate that could not be backtested.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("evaluation failed at {position:?}: {source}")]
pub struct EvaluationError {
    pub position: Vec<f64>,
    #[source]
    pub source: BacktestError,
}

/// Backtests a [`BuyZoneModel`] over the whole series of `asset` for each
/// candidate `[buy_trigger, sell_trigger, stop_loss]`.
///
/// Every evaluation builds its own account, sizer and model, so candidates
/// can be scored concurrently.
#[derive(Debug, Clone)]
pub struct BuyZoneFitness {
    asset: Asset,
    conditions: Conditions,
    initial_balance: f64,
    allocation: f64,
    metric: FitnessMetric,
    account_opened_at: NaiveDateTime,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl BuyZoneFitness {
    /// Fails when the series is empty or `allocation` is not in `(0, 1]`.
    /// The account opens one day before the first price.
    pub fn new(
        asset: Asset,
        conditions: Conditions,
        initial_balance: f64,
        allocation: f64,
    ) -> Result<Self, BacktestError> {
        let series = asset.series();
        let (Some(start), Some(end)) = (series.first_timestamp(), series.last_timestamp()) else {
            return Err(BacktestError::data(format!(
                "no prices for '{}'",
                asset.symbol()
            )));
        };
        FixedFractionSizer::new(allocation, asset.clone())?;
        Account::new(initial_balance, start)?;
        Ok(Self {
            asset,
            conditions,
            initial_balance,
            allocation,
            metric: FitnessMetric::default(),
            account_opened_at: start - Duration::days(1),
            start,
            end,
        })
    }

    pub fn with_metric(mut self, metric: FitnessMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Open the account at `t` instead of one day before the first price.
    /// `t` must precede the first price.
    pub fn with_account_opened_at(mut self, t: NaiveDateTime) -> Result<Self, BacktestError> {
        if t >= self.start {
            return Err(BacktestError::config(format!(
                "account must open before the first price at {}, got {t}",
                self.start
            )));
        }
        self.account_opened_at = t;
        Ok(self)
    }

    pub fn metric(&self) -> FitnessMetric {
        self.metric
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Run the model with `params` over the full series.
    pub fn backtest(&self, params: BuyZoneParams) -> Result<Session, BacktestError> {
        let account = Account::new(self.initial_balance, self.account_opened_at)?;
        let sizer = FixedFractionSizer::new(self.allocation, self.asset.clone())?;
        let model = BuyZoneModel::new(self.asset.clone(), params)?;
        let ctx = SignalContext::new(&self.asset, self.conditions, &sizer);
        model.generate_signals(&ctx, account, self.start, self.end)
    }
}

impl FitnessFunction for BuyZoneFitness {
    type Error = EvaluationError;

    fn evaluate(&self, position: &[f64]) -> Result<f64, EvaluationError> {
        let wrap = |source| EvaluationError {
            position: position.to_vec(),
            source,
        };
        let params = BuyZoneParams::from_slice(position).map_err(wrap)?;
        let session = self.backtest(params).map_err(wrap)?;
        Ok(self.metric.fitness(&session))
    }
}
