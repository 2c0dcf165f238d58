//! ZoneLab Runner: swarm optimization of buy-zone triggers.
//!
//! This crate builds on `zonelab-core` to provide:
//! - A seeded, optionally parallel particle swarm optimizer
//! - The buy-zone fitness adapter and metric selector
//! - Market-derived trigger bounds and single/multi-symbol optimization
//! - TOML run configuration
//! - CSV quote files as a quote source
//! - CSV and JSON export of optimized sessions

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod optimize;
pub mod swarm;

pub use config::{ConfigError, OptimizeConfig};
pub use data_loader::{CsvQuoteSource, LoadError};
pub use export::{export_series_csv, export_trades_csv, save_artifacts, ArtifactPaths};
pub use fitness::{BuyZoneFitness, EvaluationError, FitnessMetric};
pub use optimize::{
    median_high_open_spread, optimize_symbols, optimize_triggers, BoundsOverride,
    OptimizationReport, OptimizeError, OptimizeSettings, SweepRequest, TriggerBounds,
};
pub use swarm::{
    FitnessFunction, InertiaSchedule, ParticleSwarmOptimizer, SwarmConfig, SwarmError,
    SwarmOutcome, SENTINEL_FITNESS,
};
