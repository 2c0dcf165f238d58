//! CSV quote files.
//!
//! [`CsvQuoteSource`] serves quotes from `{dir}/{SYMBOL}_{interval_secs}.csv`
//! files with a `timestamp,open,high,low,close,volume` header and timestamps
//! formatted as `%Y-%m-%d %H:%M:%S`. Rows must be strictly increasing in time.
//! Requests keep the most recent `days` calendar days of the file.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use zonelab_core::data::{DataError, Quote, QuoteSource};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors from reading a quote file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no quote file for '{symbol}' at {}", .path.display())]
    Missing { symbol: String, path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}, line {line}: bad timestamp '{value}'", .path.display())]
    BadTimestamp {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{}, line {line}: {reason}", .path.display())]
    BadRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl From<LoadError> for DataError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Missing { symbol, .. } => DataError::SymbolNotFound { symbol },
            LoadError::Csv { .. } => DataError::Io(e.to_string()),
            LoadError::BadTimestamp { .. } | LoadError::BadRow { .. } => {
                DataError::ValidationError(e.to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// Reads quote files from one directory.
#[derive(Debug, Clone)]
pub struct CsvQuoteSource {
    dir: PathBuf,
}

impl CsvQuoteSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `interval_secs` bars for `symbol`.
    pub fn path_for(&self, symbol: &str, interval_secs: u32) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", symbol.to_uppercase(), interval_secs))
    }

    /// Every quote in the file, oldest first.
    pub fn load(&self, symbol: &str, interval_secs: u32) -> Result<Vec<Quote>, LoadError> {
        let path = self.path_for(symbol, interval_secs);
        if !path.is_file() {
            return Err(LoadError::Missing {
                symbol: symbol.to_string(),
                path,
            });
        }
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|source| LoadError::Csv {
                path: path.clone(),
                source,
            })?;

        let mut quotes: Vec<Quote> = Vec::new();
        for (i, row) in reader.deserialize::<QuoteRow>().enumerate() {
            let line = i + 2;
            let row = row.map_err(|source| LoadError::Csv {
                path: path.clone(),
                source,
            })?;
            let time = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT).map_err(
                |_| LoadError::BadTimestamp {
                    path: path.clone(),
                    line,
                    value: row.timestamp.clone(),
                },
            )?;
            let bad_row = |reason: String| LoadError::BadRow {
                path: path.clone(),
                line,
                reason,
            };
            if let Some(prev) = quotes.last() {
                if time <= prev.time {
                    return Err(bad_row(format!(
                        "timestamp {time} does not follow {}",
                        prev.time
                    )));
                }
            }
            let prices = [row.open, row.high, row.low, row.close];
            if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
                return Err(bad_row(format!("prices must be positive, got {prices:?}")));
            }
            quotes.push(Quote {
                time,
                interval_secs,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        debug!(symbol, path = %path.display(), rows = quotes.len(), "loaded quotes");
        Ok(quotes)
    }
}

/// Quotes dated within the last `days` calendar days of the newest quote.
pub fn last_days(quotes: Vec<Quote>, days: u32) -> Vec<Quote> {
    let Some(newest) = quotes.last().map(|q| q.time.date()) else {
        return quotes;
    };
    if days == 0 {
        return Vec::new();
    }
    match newest.checked_sub_days(Days::new(u64::from(days) - 1)) {
        Some(first_day) => quotes
            .into_iter()
            .filter(|q| q.time.date() >= first_day)
            .collect(),
        None => quotes,
    }
}

impl QuoteSource for CsvQuoteSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn quotes(&self, symbol: &str, days: u32, interval_secs: u32) -> Result<Vec<Quote>, DataError> {
        let quotes = last_days(self.load(symbol, interval_secs)?, days);
        if quotes.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
            });
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn quote(day: u32, hour: u32) -> Quote {
        Quote {
            time: NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            interval_secs: 3600,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0,
        }
    }

    #[test]
    fn path_uses_upper_case_symbol_and_interval() {
        let source = CsvQuoteSource::new("/data");
        assert_eq!(
            source.path_for("aapl", 60),
            PathBuf::from("/data/AAPL_60.csv")
        );
    }

    #[test]
    fn last_days_keeps_calendar_window() {
        let quotes = vec![quote(1, 10), quote(2, 10), quote(3, 10), quote(3, 11)];
        let kept = last_days(quotes, 2);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].time.date(), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }

    #[test]
    fn last_days_zero_keeps_nothing() {
        assert!(last_days(vec![quote(1, 10)], 0).is_empty());
    }

    #[test]
    fn missing_file_maps_to_symbol_not_found() {
        let source = CsvQuoteSource::new("/nonexistent-zonelab-dir");
        let err = source.quotes("AAPL", 5, 60).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }
}
