//! Per-series indicator memoization.
//!
//! Each [`TimeSeries`](super::TimeSeries) owns one [`IndicatorCache`]. Tables
//! are keyed by [`IndicatorKey`] and guarded by `RwLock`, so a series can be
//! shared behind an `Arc` by fitness evaluations running on rayon workers.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

/// Composite memoization key: the window's end timestamp and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub time: NaiveDateTime,
    pub period: usize,
}

impl IndicatorKey {
    pub fn new(time: NaiveDateTime, period: usize) -> Self {
        Self { time, period }
    }
}

/// A single memo table.
#[derive(Debug)]
pub(crate) struct MemoTable<V> {
    entries: RwLock<HashMap<IndicatorKey, V>>,
}

impl<V: Clone> MemoTable<V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// `compute` returning `None` is not cached.
    pub(crate) fn get_or_insert_with<F>(&self, key: IndicatorKey, compute: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        if let Some(hit) = self.read(&key) {
            return Some(hit);
        }
        let value = compute()?;
        // Two racing writers compute the same pure value; keep whichever lands first.
        let mut guard = match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(guard.entry(key).or_insert(value).clone())
    }

    pub(crate) fn read(&self, key: &IndicatorKey) -> Option<V> {
        let guard = match self.entries.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(key).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        match self.entries.read() {
            Ok(g) => g.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn clear(&mut self) {
        match self.entries.get_mut() {
            Ok(map) => map.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

/// The five indicator tables held by one series.
#[derive(Debug)]
pub(crate) struct IndicatorCache {
    pub(crate) previous: MemoTable<Arc<[f64]>>,
    pub(crate) sma: MemoTable<f64>,
    pub(crate) max: MemoTable<f64>,
    pub(crate) min: MemoTable<f64>,
    pub(crate) roc: MemoTable<f64>,
}

impl IndicatorCache {
    pub(crate) fn new() -> Self {
        Self {
            previous: MemoTable::new(),
            sma: MemoTable::new(),
            max: MemoTable::new(),
            min: MemoTable::new(),
            roc: MemoTable::new(),
        }
    }

    /// Drop every memoized value. Requires exclusive access.
    pub(crate) fn clear(&mut self) {
        self.previous.clear();
        self.sma.clear();
        self.max.clear();
        self.min.clear();
        self.roc.clear();
    }

    pub(crate) fn total_entries(&self) -> usize {
        self.previous.len() + self.sma.len() + self.max.len() + self.min.len() + self.roc.len()
    }
}

impl Default for IndicatorCache {
    fn default() -> Self {
        Self::new()
    }
}
