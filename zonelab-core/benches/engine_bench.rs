//! Criterion benchmarks for ZoneLab hot paths.
//!
//! Benchmarks:
//! 1. Indicator queries, cold vs cached
//! 2. Full buy-zone backtest over intraday bars (one fitness evaluation)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use zonelab_core::domain::{Account, Asset, Conditions};
use zonelab_core::engine::{generate_signals, SignalContext};
use zonelab_core::rules::{BuyZoneModel, BuyZoneParams};
use zonelab_core::series::TimeSeries;
use zonelab_core::sizers::FixedFractionSizer;

// ── Helpers ──────────────────────────────────────────────────────────

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

/// `days` sessions of 390 one-minute bars.
fn make_series(days: i64) -> TimeSeries {
    let mut points = Vec::new();
    for d in 0..days {
        for m in 0..390 {
            let i = (d * 390 + m) as f64;
            let price = 100.0 + (i * 0.01).sin() * 5.0 + (i * 0.37).cos() * 0.4;
            points.push((base() + Duration::days(d) + Duration::minutes(m), price));
        }
    }
    TimeSeries::from_points(points).unwrap()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    for period in [10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::new("sma_cold", period), &period, |b, &p| {
            b.iter_batched(
                || make_series(2),
                |series| {
                    let t = series.last_timestamp().unwrap();
                    black_box(series.simple_moving_average(t, p))
                },
                criterion::BatchSize::SmallInput,
            )
        });

        let series = make_series(2);
        let t = series.last_timestamp().unwrap();
        series.simple_moving_average(t, period);
        group.bench_with_input(BenchmarkId::new("sma_cached", period), &period, |b, &p| {
            b.iter(|| black_box(series.simple_moving_average(t, p)))
        });
    }
    group.finish();
}

// ── 2. Backtest ──────────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let series = Arc::new(make_series(20));
    let asset = Asset::new("BENCH", series);
    let sizer = FixedFractionSizer::new(0.75, asset.clone()).unwrap();
    let conditions = Conditions::new(10.0, 0.001).unwrap();
    let start = asset.series().first_timestamp().unwrap();
    let end = asset.series().last_timestamp().unwrap();
    let params = BuyZoneParams {
        buy_trigger: 0.3,
        sell_trigger: 0.6,
        stop_loss: 0.4,
    };

    c.bench_function("buy_zone_20_days", |b| {
        b.iter(|| {
            let ctx = SignalContext::new(&asset, conditions, &sizer);
            let model = BuyZoneModel::new(asset.clone(), params).unwrap();
            let account = Account::new(100_000.0, start - Duration::days(1)).unwrap();
            let session = generate_signals(&model, &ctx, account, start, end).unwrap();
            black_box(session.sharpe_ratio())
        })
    });
}

criterion_group!(benches, bench_indicators, bench_backtest);
criterion_main!(benches);
