//! TOML configuration for optimization runs.
//!
//! ```toml
//! symbols = ["AAPL", "MSFT"]
//! days = 30
//! interval_secs = 60
//! quotes_dir = "data"
//! fitness_metric = "sharpe"
//!
//! [account]
//! initial_balance = 100000.0
//! allocation = 0.75
//! opened_at = "2024-03-01T00:00:00"
//!
//! [costs]
//! commission = 10.0
//! slippage = 0.001
//!
//! [swarm]
//! generations = 100
//! seed = 42
//!
//! [bounds]
//! max_stop = 0.5
//! ```
//!
//! Every table and key is optional; missing values take the defaults below.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use zonelab_core::domain::Conditions;

use crate::fitness::FitnessMetric;
use crate::optimize::{BoundsOverride, OptimizeSettings, SweepRequest};
use crate::swarm::{SwarmConfig, SwarmError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid swarm config: {0}")]
    Swarm(#[from] SwarmError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub initial_balance: f64,
    pub allocation: f64,
    /// e.g. `"2024-03-01T00:00:00"`. Defaults to one day before the first price.
    pub opened_at: Option<NaiveDateTime>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_balance: 100_000.0,
            allocation: 0.75,
            opened_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostsConfig {
    /// Flat amount per trade.
    pub commission: f64,
    /// Fraction of price lost on each side of a trade.
    pub slippage: f64,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            commission: 10.0,
            slippage: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    pub symbols: Vec<String>,
    /// Calendar days of intraday history to optimize over.
    pub days: u32,
    pub interval_secs: u32,
    /// Calendar days of daily quotes behind the median spread.
    pub spread_days: u32,
    pub quotes_dir: PathBuf,
    pub fitness_metric: FitnessMetric,
    pub account: AccountConfig,
    pub costs: CostsConfig,
    pub swarm: SwarmConfig,
    pub bounds: BoundsOverride,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        let request = SweepRequest::default();
        Self {
            symbols: vec!["AAPL".to_string()],
            days: request.days,
            interval_secs: request.interval_secs,
            spread_days: request.spread_days,
            quotes_dir: PathBuf::from("data"),
            fitness_metric: FitnessMetric::default(),
            account: AccountConfig::default(),
            costs: CostsConfig::default(),
            swarm: SwarmConfig::default(),
            bounds: BoundsOverride::default(),
        }
    }
}

impl OptimizeConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("no symbols given".into()));
        }
        if let Some(blank) = self.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank symbol {blank:?}")));
        }
        if self.days == 0 || self.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "days and interval_secs must be positive".into(),
            ));
        }
        let balance = self.account.initial_balance;
        if !balance.is_finite() || balance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_balance must be positive, got {balance}"
            )));
        }
        let allocation = self.account.allocation;
        if !(allocation > 0.0 && allocation <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "allocation must be in (0, 1], got {allocation}"
            )));
        }
        Conditions::new(self.costs.commission, self.costs.slippage)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for (name, value) in [
            ("min_buy", self.bounds.min_buy),
            ("max_buy", self.bounds.max_buy),
            ("min_sell", self.bounds.min_sell),
            ("max_sell", self.bounds.max_sell),
            ("min_stop", self.bounds.min_stop),
            ("max_stop", self.bounds.max_stop),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "bounds.{name} must be a non-negative amount, got {v}"
                    )));
                }
            }
        }
        self.swarm.validate()?;
        Ok(())
    }

    pub fn settings(&self) -> OptimizeSettings {
        OptimizeSettings {
            initial_balance: self.account.initial_balance,
            allocation: self.account.allocation,
            conditions: Conditions {
                commission: self.costs.commission,
                slippage: self.costs.slippage,
            },
            metric: self.fitness_metric,
            account_opened_at: self.account.opened_at,
            swarm: self.swarm.clone(),
        }
    }

    pub fn sweep_request(&self) -> SweepRequest {
        SweepRequest {
            days: self.days,
            interval_secs: self.interval_secs,
            spread_days: self.spread_days,
            bounds: self.bounds,
        }
    }
}
