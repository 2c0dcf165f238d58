//! ZoneLab Core: price series, ledger, sessions, signal generation.
//!
//! This crate contains the heart of the backtester:
//! - Price series with memoized indicators (SMA, max, min, rate of change)
//! - Account equity ledger with no-overdraft and no-collision invariants
//! - Trades with a commission/slippage cost model
//! - Sessions that keep trades ordered and non-overlapping
//! - Rule trait and chronological signal generation
//! - Money management (position sizing)
//! - Buy-zone intraday model
//! - Deterministic RNG hierarchy for reproducible sweeps

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod rng;
pub mod rules;
pub mod series;
pub mod sizers;

pub use error::{BacktestError, Result};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across fitness evaluations is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Series
        require_send::<series::TimeSeries>();
        require_sync::<series::TimeSeries>();

        // Domain types
        require_send::<domain::Asset>();
        require_sync::<domain::Asset>();
        require_send::<domain::Conditions>();
        require_sync::<domain::Conditions>();
        require_send::<domain::Account>();
        require_sync::<domain::Account>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();

        // Engine
        require_send::<engine::Session>();
        require_sync::<engine::Session>();

        // Components
        require_send::<sizers::FixedFractionSizer>();
        require_sync::<sizers::FixedFractionSizer>();
        require_send::<rules::BuyZoneModel>();
        require_sync::<rules::BuyZoneModel>();

        // RNG
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();
    }

    /// Architecture contract: rules see the session read-only.
    #[test]
    fn rule_trait_takes_session_by_shared_reference() {
        fn _check_trait_object_builds(
            rule: &dyn rules::Rule,
            t: chrono::NaiveDateTime,
            session: &engine::Session,
        ) -> (bool, bool) {
            (rule.buy(t, session), rule.sell(t, session))
        }
    }
}
