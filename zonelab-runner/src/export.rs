//! Export: CSV trade tapes, price series and JSON reports.
//!
//! - **Trades CSV**: one row per trade with series indices, prices, cost and
//!   the account balance right after the close
//! - **Series CSV**: the price series the session ran over
//! - **JSON**: the [`OptimizationReport`] minus the session itself
//!
//! [`save_artifacts`] writes all three under one timestamp stamp.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use zonelab_core::engine::Session;
use zonelab_core::series::TimeSeries;

use crate::data_loader::TIMESTAMP_FORMAT;
use crate::optimize::OptimizationReport;

pub const TRADE_COLUMNS: [&str; 11] = [
    "open_index",
    "close_index",
    "open_time",
    "close_time",
    "open_price",
    "close_price",
    "side",
    "size",
    "purchase_cost",
    "profit",
    "balance_after_close",
];

fn fmt_time(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a session's trades. Indices are 1-based positions in the series;
/// close fields are blank for a trade that is still open.
pub fn export_trades_csv(session: &Session) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;

    for trade in session.trades() {
        let series = trade.asset().series();
        let index = |t: NaiveDateTime| {
            series
                .index_of(t)
                .map(|i| (i + 1).to_string())
                .unwrap_or_default()
        };
        let close = trade.close();
        wtr.write_record([
            index(trade.open()),
            close.map(index).unwrap_or_default(),
            fmt_time(trade.open()),
            close.map(fmt_time).unwrap_or_default(),
            fmt_opt(trade.open_price().ok()),
            fmt_opt(trade.close_price().ok()),
            trade.side().to_string(),
            trade.size().to_string(),
            fmt_opt(trade.purchase_price().ok()),
            fmt_opt(trade.profit().ok()),
            fmt_opt(close.and_then(|t| session.account().value_at(t))),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export a price series as `timestamp,price`.
pub fn export_series_csv(series: &TimeSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "price"])?;
    for (t, price) in series.iter() {
        wtr.write_record([fmt_time(t), format!("{price:.4}")])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &OptimizationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Files written by [`save_artifacts`]. CSV paths are `None` when the
/// session made no trades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub report: PathBuf,
    pub trades: Option<PathBuf>,
    pub series: Option<PathBuf>,
}

/// Save `{symbol}_report_{stamp}.json` under `output_dir` and, when the
/// session traded, `{symbol}_trades_{stamp}.csv` and
/// `{symbol}_series_{stamp}.csv`.
pub fn save_artifacts(report: &OptimizationReport, output_dir: &Path) -> Result<ArtifactPaths> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    save_artifacts_stamped(report, output_dir, &stamp)
}

/// [`save_artifacts`] with an explicit file-name stamp.
pub fn save_artifacts_stamped(
    report: &OptimizationReport,
    output_dir: &Path,
    stamp: &str,
) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let file = |kind: &str, ext: &str| {
        output_dir.join(format!("{}_{kind}_{stamp}.{ext}", report.symbol))
    };

    let report_path = file("report", "json");
    std::fs::write(&report_path, export_json(report)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    if report.session.trades().is_empty() {
        return Ok(ArtifactPaths {
            report: report_path,
            trades: None,
            series: None,
        });
    }

    let trades_path = file("trades", "csv");
    std::fs::write(&trades_path, export_trades_csv(&report.session)?)
        .with_context(|| format!("failed to write {}", trades_path.display()))?;

    let series_path = file("series", "csv");
    std::fs::write(&series_path, export_series_csv(&report.series)?)
        .with_context(|| format!("failed to write {}", series_path.display()))?;

    Ok(ArtifactPaths {
        report: report_path,
        trades: Some(trades_path),
        series: Some(series_path),
    })
}
