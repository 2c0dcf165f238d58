//! ZoneLab CLI: optimize and backtest buy-zone triggers.
//!
//! Commands:
//! - `optimize`: run the particle swarm over one or more symbols from CSV
//!   quote files and save the optimized sessions
//! - `backtest`: run the buy-zone model once with explicit triggers
//!
//! Logging goes through `tracing`; set `RUST_LOG` to change the level
//! (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use zonelab_core::data::{quotes_to_series, QuoteSource};
use zonelab_core::domain::Asset;
use zonelab_core::engine::SessionStatistics;
use zonelab_core::rules::BuyZoneParams;
use zonelab_runner::{
    optimize_symbols, save_artifacts, CsvQuoteSource, FitnessMetric, OptimizationReport,
    OptimizeConfig,
};

#[derive(Parser)]
#[command(
    name = "zonelab",
    about = "ZoneLab CLI: intraday buy-zone backtesting and swarm optimization"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize buy, sell and stop-loss triggers with a particle swarm.
    Optimize {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols to optimize (overrides the config).
        symbols: Vec<String>,

        /// Directory holding `{SYMBOL}_{interval}.csv` quote files.
        #[arg(long)]
        quotes_dir: Option<PathBuf>,

        /// Generations to run (overrides the config).
        #[arg(long)]
        generations: Option<usize>,

        /// Master seed (overrides the config).
        #[arg(long)]
        seed: Option<u64>,

        /// Metric to maximize: sharpe, gross_profit or win_rate.
        #[arg(long)]
        metric: Option<String>,

        /// Evaluate each generation on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output directory for reports and CSV files.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print results without writing any files.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Backtest fixed triggers over the configured history.
    Backtest {
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        buy: f64,

        #[arg(long)]
        sell: f64,

        #[arg(long)]
        stop: f64,

        /// Path to a TOML config file for account, costs and history.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        quotes_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            config,
            symbols,
            quotes_dir,
            generations,
            seed,
            metric,
            sequential,
            output_dir,
            no_save,
        } => {
            let mut cfg = load_config(config)?;
            if !symbols.is_empty() {
                cfg.symbols = symbols;
            }
            if let Some(dir) = quotes_dir {
                cfg.quotes_dir = dir;
            }
            if let Some(g) = generations {
                cfg.swarm.generations = g;
            }
            if let Some(s) = seed {
                cfg.swarm.seed = s;
            }
            if let Some(m) = metric {
                cfg.fitness_metric = parse_metric(&m)?;
            }
            if sequential {
                cfg.swarm.parallel = false;
            }
            cfg.validate()?;
            run_optimize(&cfg, (!no_save).then_some(output_dir))
        }
        Commands::Backtest {
            symbol,
            buy,
            sell,
            stop,
            config,
            quotes_dir,
        } => {
            let mut cfg = load_config(config)?;
            if let Some(dir) = quotes_dir {
                cfg.quotes_dir = dir;
            }
            let params = BuyZoneParams {
                buy_trigger: buy,
                sell_trigger: sell,
                stop_loss: stop,
            };
            run_backtest(&cfg, &symbol, params)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<OptimizeConfig> {
    match path {
        Some(p) => OptimizeConfig::from_file(&p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(OptimizeConfig::default()),
    }
}

fn parse_metric(name: &str) -> Result<FitnessMetric> {
    Ok(match name {
        "sharpe" => FitnessMetric::Sharpe,
        "gross_profit" => FitnessMetric::GrossProfit,
        "win_rate" => FitnessMetric::WinRate,
        _ => bail!("unknown metric '{name}'. Valid: sharpe, gross_profit, win_rate"),
    })
}

fn run_optimize(cfg: &OptimizeConfig, output_dir: Option<PathBuf>) -> Result<()> {
    let source = CsvQuoteSource::new(&cfg.quotes_dir);
    let results = optimize_symbols(
        &source,
        &cfg.symbols,
        &cfg.sweep_request(),
        &cfg.settings(),
        None,
    );

    let mut failures = 0;
    for (symbol, result) in &results {
        match result {
            Ok(report) => {
                print_report(report);
                if let Some(dir) = &output_dir {
                    let paths = save_artifacts(report, dir)?;
                    println!("Report saved to: {}", paths.report.display());
                    if let Some(trades) = &paths.trades {
                        println!("Trades saved to: {}", trades.display());
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error for {symbol}: {e}");
            }
        }
    }

    if failures == results.len() {
        bail!("optimization failed for every symbol");
    }
    Ok(())
}

fn run_backtest(cfg: &OptimizeConfig, symbol: &str, params: BuyZoneParams) -> Result<()> {
    let source = CsvQuoteSource::new(&cfg.quotes_dir);
    let quotes = source
        .quotes(symbol, cfg.days, cfg.interval_secs)
        .with_context(|| format!("failed to load quotes for {symbol}"))?;
    let series = quotes_to_series(&quotes)?;
    info!(symbol, bars = series.len(), "loaded series");

    let settings = cfg.settings();
    let asset = Asset::new(symbol, Arc::new(series));
    let fitness = settings.fitness(asset)?;
    let session = fitness.backtest(params)?;

    print_statistics(&session.statistics());
    Ok(())
}

fn print_report(report: &OptimizationReport) {
    println!();
    println!("=== {} ===", report.symbol);
    println!("Buy trigger:  {:.4}", report.params.buy_trigger);
    println!("Sell trigger: {:.4}", report.params.sell_trigger);
    println!("Stop loss:    {:.4}", report.params.stop_loss);
    println!(
        "Swarm:        {} generations, {} evaluations ({} failed)",
        report.outcome.generations_run,
        report.outcome.evaluations,
        report.outcome.failed_evaluations
    );
    print_statistics(&report.statistics);
}

fn print_statistics(stats: &SessionStatistics) {
    println!("Trades:       {}", stats.trade_count);
    println!("Win rate:     {:.1}%", stats.win_rate * 100.0);
    println!("Gross profit: {:.2}", stats.gross_profit);
    println!("Sharpe:       {:.4}", stats.sharpe);
    println!("Max drawdown: {:.2}%", stats.max_drawdown * 100.0);
    println!(
        "Balance:      {:.2} -> {:.2}",
        stats.starting_balance, stats.final_balance
    );
}
