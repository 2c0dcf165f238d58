//! Price series with memoized indicators.
//!
//! A [`TimeSeries`] is an ordered `timestamp → price` map. It never changes
//! after construction except through [`TimeSeries::remove_days`], which drops a
//! prefix and clears every cache table.
//!
//! Indicator queries (`previous_values`, `simple_moving_average`, `max`, `min`,
//! `rate_of_change`) are memoized per `(timestamp, period)` in an indicator
//! cache owned by the series instance.

mod cache;

pub use cache::IndicatorKey;

use cache::IndicatorCache;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::{BacktestError, Result};

/// Decimal places kept when a moving average does not divide evenly.
pub const SMA_DECIMALS: u32 = 3;

/// Decimal places kept for rate of change.
pub const ROC_DECIMALS: u32 = 2;

/// Stand-in denominator when the rate-of-change reference price is zero.
pub const ROC_ZERO_DENOMINATOR: f64 = 0.001;

/// Round half away from zero to `decimals` places.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

#[derive(Debug)]
pub struct TimeSeries {
    prices: BTreeMap<NaiveDateTime, f64>,
    cache: IndicatorCache,
}

impl TimeSeries {
    /// Build a series from a price map. Prices must be finite.
    pub fn new(prices: BTreeMap<NaiveDateTime, f64>) -> Result<Self> {
        if let Some((t, p)) = prices.iter().find(|(_, p)| !p.is_finite()) {
            return Err(BacktestError::data(format!("non-finite price {p} at {t}")));
        }
        Ok(Self {
            prices,
            cache: IndicatorCache::new(),
        })
    }

    /// Build a series from `(timestamp, price)` pairs, which must be strictly
    /// increasing in time.
    pub fn from_points<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        let mut prices = BTreeMap::new();
        let mut last: Option<NaiveDateTime> = None;
        for (t, p) in points {
            if let Some(prev) = last {
                if t <= prev {
                    return Err(BacktestError::data(format!(
                        "timestamps must be strictly increasing: {t} follows {prev}"
                    )));
                }
            }
            prices.insert(t, p);
            last = Some(t);
        }
        Self::new(prices)
    }

    // ─── Lookups ────────────────────────────────────────────────────────

    pub fn price_at(&self, t: NaiveDateTime) -> Option<f64> {
        self.prices.get(&t).copied()
    }

    /// Like [`price_at`](Self::price_at) but a missing timestamp is an error.
    pub fn require_price(&self, t: NaiveDateTime) -> Result<f64> {
        self.price_at(t)
            .ok_or_else(|| BacktestError::data(format!("no price recorded at {t}")))
    }

    pub fn has_price_at(&self, t: NaiveDateTime) -> bool {
        self.prices.contains_key(&t)
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.prices.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.prices.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDateTime, f64)> + '_ {
        self.prices.iter().map(|(t, p)| (*t, *p))
    }

    /// Zero-based position of `t` in the series.
    pub fn index_of(&self, t: NaiveDateTime) -> Option<usize> {
        if !self.has_price_at(t) {
            return None;
        }
        Some(self.prices.range(..t).count())
    }

    /// All points with `start <= t <= end`, chronological. Empty when
    /// `start > end`.
    pub fn date_slice(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<(NaiveDateTime, f64)> {
        if start > end {
            return Vec::new();
        }
        self.prices
            .range((Bound::Included(start), Bound::Included(end)))
            .map(|(t, p)| (*t, *p))
            .collect()
    }

    // ─── Calendar-day helpers ───────────────────────────────────────────

    fn day_range(
        &self,
        day: NaiveDate,
    ) -> impl DoubleEndedIterator<Item = (&NaiveDateTime, &f64)> + '_ {
        let start = day.and_time(NaiveTime::MIN);
        let end = day
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(NaiveTime::MIN));
        let upper = match end {
            Some(e) => Bound::Excluded(e),
            None => Bound::Unbounded,
        };
        self.prices.range((Bound::Included(start), upper))
    }

    /// Price at the first recorded timestamp on `t`'s calendar date.
    pub fn open_on_day(&self, t: NaiveDateTime) -> Option<f64> {
        self.day_range(t.date()).next().map(|(_, p)| *p)
    }

    /// The last recorded timestamp on `t`'s calendar date.
    pub fn close_on_day(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        self.day_range(t.date()).next_back().map(|(t, _)| *t)
    }

    /// Drop every point dated before `first_date + days`. Clears all caches.
    pub fn remove_days(&mut self, days: u64) {
        let Some(first) = self.first_timestamp() else {
            return;
        };
        let Some(cutoff) = first
            .date()
            .checked_add_days(Days::new(days))
            .map(|d| d.and_time(NaiveTime::MIN))
        else {
            self.prices.clear();
            self.cache.clear();
            return;
        };
        self.prices = self.prices.split_off(&cutoff);
        self.cache.clear();
    }

    // ─── Indicators ─────────────────────────────────────────────────────

    /// The `period` most recent prices at or before `t`, most recent first.
    ///
    /// `None` when `period` is zero or fewer than `period` prices exist.
    pub fn previous_values(&self, t: NaiveDateTime, period: usize) -> Option<Arc<[f64]>> {
        if period == 0 {
            return None;
        }
        self.cache
            .previous
            .get_or_insert_with(IndicatorKey::new(t, period), || {
                let window: Vec<f64> = self
                    .prices
                    .range(..=t)
                    .rev()
                    .take(period)
                    .map(|(_, p)| *p)
                    .collect();
                (window.len() == period).then(|| Arc::from(window))
            })
    }

    /// Arithmetic mean of [`previous_values`](Self::previous_values). Exact
    /// when `period` divides the sum evenly, else rounded to
    /// [`SMA_DECIMALS`].
    pub fn simple_moving_average(&self, t: NaiveDateTime, period: usize) -> Option<f64> {
        self.cache
            .sma
            .get_or_insert_with(IndicatorKey::new(t, period), || {
                let window = self.previous_values(t, period)?;
                let sum: f64 = window.iter().sum();
                let n = period as f64;
                if sum % n == 0.0 {
                    Some(sum / n)
                } else {
                    Some(round_half_up(sum / n, SMA_DECIMALS))
                }
            })
    }

    pub fn max(&self, t: NaiveDateTime, period: usize) -> Option<f64> {
        self.cache
            .max
            .get_or_insert_with(IndicatorKey::new(t, period), || {
                let window = self.previous_values(t, period)?;
                window.iter().copied().reduce(f64::max)
            })
    }

    pub fn min(&self, t: NaiveDateTime, period: usize) -> Option<f64> {
        self.cache
            .min
            .get_or_insert_with(IndicatorKey::new(t, period), || {
                let window = self.previous_values(t, period)?;
                window.iter().copied().reduce(f64::min)
            })
    }

    /// `(price(t) - reference) / reference`, where the reference is the oldest
    /// price in the `period` window ending at `t`. Rounded to
    /// [`ROC_DECIMALS`].
    ///
    /// `None` when `t` is not a recorded timestamp or history is too short.
    pub fn rate_of_change(&self, t: NaiveDateTime, period: usize) -> Option<f64> {
        self.cache
            .roc
            .get_or_insert_with(IndicatorKey::new(t, period), || {
                let current = self.price_at(t)?;
                let window = self.previous_values(t, period)?;
                let reference = *window.last()?;
                let denominator = if reference == 0.0 {
                    ROC_ZERO_DENOMINATOR
                } else {
                    reference
                };
                Some(round_half_up((current - reference) / denominator, ROC_DECIMALS))
            })
    }

    /// Number of memoized indicator values across all tables.
    pub fn cached_entries(&self) -> usize {
        self.cache.total_entries()
    }
}

impl Clone for TimeSeries {
    /// Clones the price data with empty caches.
    fn clone(&self) -> Self {
        Self {
            prices: self.prices.clone(),
            cache: IndicatorCache::new(),
        }
    }
}
