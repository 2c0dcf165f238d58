//! Buy-zone trigger optimization.
//!
//! - Search bounds come from the market: every trigger is capped by the median
//!   daily `high - open` spread, and the sell target starts at 0.2% of the
//!   first price
//! - [`optimize_triggers`] runs the swarm over one series and replays the
//!   winning triggers to produce the final session
//! - [`optimize_symbols`] does the same for a list of symbols pulled from a
//!   [`QuoteSource`], with one seed per symbol derived from the master seed

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use zonelab_core::data::{quotes_to_series, DataError, Quote, QuoteSource};
use zonelab_core::domain::{Asset, Conditions};
use zonelab_core::engine::{Session, SessionStatistics};
use zonelab_core::rng::RngHierarchy;
use zonelab_core::rules::BuyZoneParams;
use zonelab_core::series::TimeSeries;
use zonelab_core::BacktestError;

use crate::fitness::{BuyZoneFitness, FitnessMetric};
use crate::swarm::{ParticleSwarmOptimizer, SwarmConfig, SwarmError, SwarmOutcome};

/// The lowest sell target, as a fraction of the first price in the series.
pub const MIN_SELL_FRACTION: f64 = 0.002;

/// Bar length of the quotes used for the median spread.
pub const DAILY_INTERVAL_SECS: u32 = 86_400;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("series for '{0}' has no prices")]
    EmptySeries(String),
}

// ─── Bounds ──────────────────────────────────────────────────────────

/// Median of `high - open` over `quotes`. `None` for no quotes.
///
/// An even count averages the two middle values.
pub fn median_high_open_spread(quotes: &[Quote]) -> Option<f64> {
    let mut spreads: Vec<f64> = quotes.iter().map(Quote::high_open_spread).collect();
    if spreads.is_empty() {
        return None;
    }
    spreads.sort_by(f64::total_cmp);
    let mid = spreads.len() / 2;
    if spreads.len() % 2 == 0 {
        Some((spreads[mid - 1] + spreads[mid]) / 2.0)
    } else {
        Some(spreads[mid])
    }
}

/// Per-trigger optional replacements for market-derived bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsOverride {
    pub min_buy: Option<f64>,
    pub max_buy: Option<f64>,
    pub min_sell: Option<f64>,
    pub max_sell: Option<f64>,
    pub min_stop: Option<f64>,
    pub max_stop: Option<f64>,
}

impl BoundsOverride {
    /// True when every bound is given, so no market data is needed.
    pub fn is_complete(&self) -> bool {
        [
            self.min_buy,
            self.max_buy,
            self.min_sell,
            self.max_sell,
            self.min_stop,
            self.max_stop,
        ]
        .iter()
        .all(Option::is_some)
    }
}

/// Search box for `[buy_trigger, sell_trigger, stop_loss]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerBounds {
    pub min: BuyZoneParams,
    pub max: BuyZoneParams,
}

impl TriggerBounds {
    /// Buy in `[0, m]`, sell in `[0.002 * first_price, m]`, stop in `[0, m]`
    /// where `m` is the median spread. A range whose minimum exceeds `m` is
    /// widened so its maximum equals its minimum.
    pub fn from_market(first_price: f64, median_spread: f64) -> Self {
        let m = median_spread.max(0.0);
        let min = BuyZoneParams {
            buy_trigger: 0.0,
            sell_trigger: MIN_SELL_FRACTION * first_price,
            stop_loss: 0.0,
        };
        let max = BuyZoneParams {
            buy_trigger: m,
            sell_trigger: m.max(min.sell_trigger),
            stop_loss: m,
        };
        Self { min, max }
    }

    /// Replace the bounds `overrides` names, then widen any inverted range.
    pub fn with_overrides(self, overrides: &BoundsOverride) -> Self {
        let pick = |value: Option<f64>, fallback: f64| value.unwrap_or(fallback);
        let min = BuyZoneParams {
            buy_trigger: pick(overrides.min_buy, self.min.buy_trigger),
            sell_trigger: pick(overrides.min_sell, self.min.sell_trigger),
            stop_loss: pick(overrides.min_stop, self.min.stop_loss),
        };
        let max = BuyZoneParams {
            buy_trigger: pick(overrides.max_buy, self.max.buy_trigger).max(min.buy_trigger),
            sell_trigger: pick(overrides.max_sell, self.max.sell_trigger).max(min.sell_trigger),
            stop_loss: pick(overrides.max_stop, self.max.stop_loss).max(min.stop_loss),
        };
        Self { min, max }
    }

    /// Bounds taken entirely from `overrides`; unset values fall back to 0.
    pub fn from_overrides(overrides: &BoundsOverride) -> Self {
        let zero = BuyZoneParams {
            buy_trigger: 0.0,
            sell_trigger: 0.0,
            stop_loss: 0.0,
        };
        Self {
            min: zero,
            max: zero,
        }
        .with_overrides(overrides)
    }

    pub fn mins(&self) -> Vec<f64> {
        self.min.to_vec()
    }

    pub fn maxs(&self) -> Vec<f64> {
        self.max.to_vec()
    }
}

// ─── Driver ──────────────────────────────────────────────────────────

/// Everything an optimization run needs besides the series and bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeSettings {
    pub initial_balance: f64,
    /// Fraction of the balance committed to each trade.
    pub allocation: f64,
    pub conditions: Conditions,
    pub metric: FitnessMetric,
    /// When the account opens. `None` opens it one day before the first price.
    pub account_opened_at: Option<NaiveDateTime>,
    pub swarm: SwarmConfig,
}

impl OptimizeSettings {
    /// The fitness adapter these settings describe, bound to `asset`.
    pub fn fitness(&self, asset: Asset) -> Result<BuyZoneFitness, BacktestError> {
        let fitness = BuyZoneFitness::new(
            asset,
            self.conditions,
            self.initial_balance,
            self.allocation,
        )?
        .with_metric(self.metric);
        match self.account_opened_at {
            Some(t) => fitness.with_account_opened_at(t),
            None => Ok(fitness),
        }
    }
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            initial_balance: 100_000.0,
            allocation: 0.75,
            conditions: Conditions {
                commission: 10.0,
                slippage: 0.001,
            },
            metric: FitnessMetric::default(),
            account_opened_at: None,
            swarm: SwarmConfig::default(),
        }
    }
}

/// Best triggers for one symbol and the session they produce.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub symbol: String,
    pub metric: FitnessMetric,
    pub params: BuyZoneParams,
    pub bounds: TriggerBounds,
    pub outcome: SwarmOutcome,
    pub statistics: SessionStatistics,
    #[serde(skip)]
    pub session: Session,
    #[serde(skip)]
    pub series: Arc<TimeSeries>,
}

/// Optimize buy-zone triggers for `symbol` over the whole of `series`.
pub fn optimize_triggers(
    series: Arc<TimeSeries>,
    symbol: &str,
    settings: &OptimizeSettings,
    bounds: TriggerBounds,
    cancel: Option<&AtomicBool>,
) -> Result<OptimizationReport, OptimizeError> {
    if series.is_empty() {
        return Err(OptimizeError::EmptySeries(symbol.to_string()));
    }
    let asset = Asset::new(symbol, Arc::clone(&series));
    let fitness = settings.fitness(asset)?;

    info!(
        symbol,
        bars = series.len(),
        metric = %settings.metric,
        generations = settings.swarm.generations,
        swarm_size = settings.swarm.swarm_size,
        min = ?bounds.mins(),
        max = ?bounds.maxs(),
        "optimizing triggers"
    );

    let replay = fitness.clone();
    let optimizer = ParticleSwarmOptimizer::new(
        fitness,
        bounds.mins(),
        bounds.maxs(),
        settings.swarm.clone(),
    )?;
    let outcome = optimizer.run(cancel);

    let params = BuyZoneParams::from_slice(&outcome.best_position)?;
    let session = replay.backtest(params)?;
    let statistics = session.statistics();

    info!(
        symbol,
        buy_trigger = params.buy_trigger,
        sell_trigger = params.sell_trigger,
        stop_loss = params.stop_loss,
        trades = statistics.trade_count,
        sharpe = statistics.sharpe,
        gross_profit = statistics.gross_profit,
        "optimization finished"
    );

    Ok(OptimizationReport {
        symbol: symbol.to_string(),
        metric: settings.metric,
        params,
        bounds,
        outcome,
        statistics,
        session,
        series,
    })
}

/// Where and how much history to pull for a multi-symbol sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub days: u32,
    pub interval_secs: u32,
    /// Calendar days of daily quotes behind the median spread.
    pub spread_days: u32,
    pub bounds: BoundsOverride,
}

impl Default for SweepRequest {
    fn default() -> Self {
        Self {
            days: 30,
            interval_secs: 60,
            spread_days: 365,
            bounds: BoundsOverride::default(),
        }
    }
}

/// Build the search box for `symbol`, reading daily quotes only when the
/// overrides leave something to derive.
pub fn market_bounds(
    source: &dyn QuoteSource,
    symbol: &str,
    series: &TimeSeries,
    request: &SweepRequest,
) -> Result<TriggerBounds, OptimizeError> {
    if request.bounds.is_complete() {
        return Ok(TriggerBounds::from_overrides(&request.bounds));
    }
    let daily = source.quotes(symbol, request.spread_days, DAILY_INTERVAL_SECS)?;
    let median = median_high_open_spread(&daily).ok_or_else(|| DataError::Empty {
        symbol: symbol.to_string(),
    })?;
    let first_price = series
        .iter()
        .next()
        .map(|(_, p)| p)
        .ok_or_else(|| OptimizeError::EmptySeries(symbol.to_string()))?;
    Ok(TriggerBounds::from_market(first_price, median).with_overrides(&request.bounds))
}

/// Optimize every symbol independently. Each symbol's swarm is seeded from
/// `RngHierarchy::sub_seed(symbol, 0)` of the configured seed, so results
/// do not depend on the order of `symbols`. Failures are reported per symbol.
pub fn optimize_symbols(
    source: &dyn QuoteSource,
    symbols: &[String],
    request: &SweepRequest,
    settings: &OptimizeSettings,
    cancel: Option<&AtomicBool>,
) -> Vec<(String, Result<OptimizationReport, OptimizeError>)> {
    let seeds = RngHierarchy::new(settings.swarm.seed);
    let run_one = |symbol: &String| {
        let result = optimize_one(source, symbol, request, settings, &seeds, cancel);
        if let Err(e) = &result {
            warn!(symbol = %symbol, error = %e, "symbol optimization failed");
        }
        (symbol.clone(), result)
    };

    info!(
        source = source.name(),
        symbols = symbols.len(),
        master_seed = seeds.master_seed(),
        "starting sweep"
    );

    if settings.swarm.parallel {
        symbols.par_iter().map(run_one).collect()
    } else {
        symbols.iter().map(run_one).collect()
    }
}

fn optimize_one(
    source: &dyn QuoteSource,
    symbol: &str,
    request: &SweepRequest,
    settings: &OptimizeSettings,
    seeds: &RngHierarchy,
    cancel: Option<&AtomicBool>,
) -> Result<OptimizationReport, OptimizeError> {
    let quotes = source.quotes(symbol, request.days, request.interval_secs)?;
    let series = quotes_to_series(&quotes)?;
    let bounds = market_bounds(source, symbol, &series, request)?;

    let mut symbol_settings = settings.clone();
    symbol_settings.swarm.seed = seeds.sub_seed(symbol, 0);
    optimize_triggers(Arc::new(series), symbol, &symbol_settings, bounds, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::BTreeMap;

    fn assert_approx(actual: f64, expected: f64, eps: f64) {
        assert!(
            (actual - expected).abs() < eps,
            "expected {expected}, got {actual}"
        );
    }

    fn daily(day: u32, open: f64, high: f64) -> Quote {
        let time: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Quote {
            time,
            interval_secs: DAILY_INTERVAL_SECS,
            open,
            high,
            low: open - 1.0,
            close: open,
            volume: 10,
        }
    }

    #[test]
    fn median_of_odd_count() {
        let q = [daily(1, 10.0, 10.5), daily(2, 10.0, 13.0), daily(3, 10.0, 11.0)];
        assert_approx(median_high_open_spread(&q).unwrap(), 1.0, 1e-12);
    }

    #[test]
    fn median_of_even_count_averages_middle() {
        let q = [
            daily(1, 10.0, 10.5),
            daily(2, 10.0, 13.0),
            daily(3, 10.0, 11.0),
            daily(4, 10.0, 12.0),
        ];
        assert_approx(median_high_open_spread(&q).unwrap(), 1.5, 1e-12);
    }

    #[test]
    fn median_of_nothing_is_none() {
        assert_eq!(median_high_open_spread(&[]), None);
    }

    #[test]
    fn market_bounds_follow_median() {
        let b = TriggerBounds::from_market(100.0, 1.5);
        assert_eq!(b.min.buy_trigger, 0.0);
        assert_approx(b.min.sell_trigger, 0.2, 1e-12);
        assert_eq!(b.min.stop_loss, 0.0);
        assert_eq!(b.maxs(), vec![1.5, 1.5, 1.5]);
    }

    #[test]
    fn tiny_median_widens_sell_range() {
        let b = TriggerBounds::from_market(500.0, 0.5);
        assert_approx(b.min.sell_trigger, 1.0, 1e-12);
        assert_eq!(b.max.sell_trigger, b.min.sell_trigger);
        assert_eq!(b.max.buy_trigger, 0.5);
    }

    #[test]
    fn overrides_replace_named_bounds_only() {
        let o = BoundsOverride {
            max_stop: Some(0.25),
            min_buy: Some(0.1),
            ..BoundsOverride::default()
        };
        let market = TriggerBounds::from_market(100.0, 1.5);
        let b = market.with_overrides(&o);
        assert_eq!(b.min.buy_trigger, 0.1);
        assert_eq!(b.min.sell_trigger, market.min.sell_trigger);
        assert_eq!(b.maxs(), vec![1.5, 1.5, 0.25]);
    }

    #[test]
    fn complete_overrides_need_no_market() {
        let o = BoundsOverride {
            min_buy: Some(0.0),
            max_buy: Some(1.0),
            min_sell: Some(0.1),
            max_sell: Some(2.0),
            min_stop: Some(0.0),
            max_stop: Some(0.5),
        };
        assert!(o.is_complete());
        let b = TriggerBounds::from_overrides(&o);
        assert_eq!(b.maxs(), vec![1.0, 2.0, 0.5]);
    }

    #[test]
    fn empty_series_is_rejected() {
        let empty = Arc::new(TimeSeries::new(BTreeMap::new()).unwrap());
        let err = optimize_triggers(
            empty,
            "NONE",
            &OptimizeSettings::default(),
            TriggerBounds::from_market(1.0, 1.0),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OptimizeError::EmptySeries(_)));
    }
}
