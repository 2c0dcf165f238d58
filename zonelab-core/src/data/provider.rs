//! Quote source trait and structured error types.
//!
//! The QuoteSource trait abstracts over where quotes come from (CSV files,
//! in-memory fixtures) so the optimizer can be driven from any of them and
//! mocked in tests.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::TimeSeries;

/// One OHLCV bar of `interval_secs` length starting at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub time: NaiveDateTime,
    pub interval_secs: u32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Quote {
    /// `high - open`: how far the bar ran above its opening price.
    pub fn high_open_spread(&self) -> f64 {
        self.high - self.open
    }
}

/// Structured error types for quote operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no quotes for '{symbol}' in the requested window")]
    Empty { symbol: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Trait for quote sources.
pub trait QuoteSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// The most recent `days` calendar days of `interval_secs` bars for
    /// `symbol`, oldest first.
    fn quotes(&self, symbol: &str, days: u32, interval_secs: u32) -> Result<Vec<Quote>, DataError>;
}

/// Build a price series from quotes, one point per quote at its open price.
pub fn quotes_to_series(quotes: &[Quote]) -> Result<TimeSeries, DataError> {
    TimeSeries::from_points(quotes.iter().map(|q| (q.time, q.open)))
        .map_err(|e| DataError::ValidationError(e.to_string()))
}
