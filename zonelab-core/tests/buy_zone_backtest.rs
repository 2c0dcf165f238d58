//! Buy-zone model driven through full signal generation on intraday data.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::sync::Arc;
use zonelab_core::domain::{Account, Asset, Conditions, TradeSide};
use zonelab_core::engine::{generate_signals, SignalContext};
use zonelab_core::rules::{BuyZoneModel, BuyZoneParams};
use zonelab_core::series::TimeSeries;
use zonelab_core::sizers::FixedFractionSizer;

const BARS_PER_DAY: i64 = 60;

fn session_open(day: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 11)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
        + Duration::days(day)
}

/// Three trading days of one-minute bars with a different intraday shape each day.
fn intraday_asset() -> Asset {
    let mut points = Vec::new();
    for day in 0..3 {
        let open = 100.0 + day as f64;
        for m in 0..BARS_PER_DAY {
            let x = m as f64;
            let price = match day {
                0 => open + x * 0.05,                 // steady rally
                1 => open - x * 0.03,                 // steady decline
                _ => open + (x * 0.3).sin() * 1.5,    // chop
            };
            points.push((session_open(day) + Duration::minutes(m), price));
        }
    }
    Asset::new("INTRA", Arc::new(TimeSeries::from_points(points).unwrap()))
}

fn run(params: BuyZoneParams) -> zonelab_core::engine::Session {
    let asset = intraday_asset();
    let series = asset.series();
    let (start, end) = (series.first_timestamp().unwrap(), series.last_timestamp().unwrap());
    let sizer = FixedFractionSizer::new(0.75, asset.clone()).unwrap();
    let conditions = Conditions::new(10.0, 0.001).unwrap();
    let ctx = SignalContext::new(&asset, conditions, &sizer);
    let model = BuyZoneModel::new(asset.clone(), params).unwrap();
    let account = Account::new(100_000.0, start - Duration::days(1)).unwrap();
    generate_signals(&model, &ctx, account, start, end).unwrap()
}

#[test]
fn at_most_one_entry_per_day_and_always_flat_at_end() {
    let session = run(BuyZoneParams {
        buy_trigger: 0.2,
        sell_trigger: 0.5,
        stop_loss: 0.3,
    });
    assert!(!session.trades().is_empty());

    let mut days = HashSet::new();
    for trade in session.trades() {
        assert!(days.insert(trade.open().date()), "two entries on one day");
        assert_eq!(trade.side(), TradeSide::Long);
        let close = trade.close().expect("every trade is closed");
        assert_eq!(close.date(), trade.open().date(), "held overnight");
    }
    assert_eq!(session.profit_curve().len(), session.trades().len());
}

#[test]
fn rally_day_hits_the_target() {
    let session = run(BuyZoneParams {
        buy_trigger: 0.18,
        sell_trigger: 0.48,
        stop_loss: 5.0,
    });
    let first = &session.trades()[0];
    assert_eq!(first.open().date(), session_open(0).date());
    // 0.05 per minute: enters at +0.2 (minute 4), exits at +0.5 from entry (minute 14)
    assert_eq!(first.open().minute() - 30, 4);
    assert_eq!(first.close().unwrap().minute() - 30, 14);
}

#[test]
fn unreachable_triggers_produce_no_trades() {
    let session = run(BuyZoneParams {
        buy_trigger: 50.0,
        sell_trigger: 1.0,
        stop_loss: 1.0,
    });
    assert!(session.trades().is_empty());
    assert_eq!(session.account().current_balance(), 100_000.0);
}

#[test]
fn end_of_day_exit_when_target_and_stop_are_wide() {
    let session = run(BuyZoneParams {
        buy_trigger: 0.0,
        sell_trigger: 100.0,
        stop_loss: 100.0,
    });
    for trade in session.trades() {
        let close = trade.close().unwrap();
        let series = trade.asset().series();
        assert_eq!(series.close_on_day(close), Some(close));
    }
}
