//! Chronological signal generation.
//!
//! Walks `date_slice(start, end)` one timestamp at a time. At each bar the
//! rule's `buy` and `sell` predicates are evaluated against the session so
//! far; the first failure (ledger, ordering, sizing) aborts the run.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::{Account, Asset, Conditions, Trade, TradeSide};
use crate::engine::session::Session;
use crate::error::Result;
use crate::rules::Rule;
use crate::sizers::MoneyManagementStrategy;

/// Everything a run needs besides the rule and the account.
pub struct SignalContext<'a> {
    pub asset: &'a Asset,
    pub conditions: Conditions,
    pub money_manager: &'a dyn MoneyManagementStrategy,
}

impl<'a> SignalContext<'a> {
    pub fn new(
        asset: &'a Asset,
        conditions: Conditions,
        money_manager: &'a dyn MoneyManagementStrategy,
    ) -> Self {
        Self {
            asset,
            conditions,
            money_manager,
        }
    }
}

enum Step {
    Continue,
    Stop,
}

/// Run `rule` over `[start, end]` and return the finished session.
///
/// - No trade opens on the terminal bar of the slice
/// - A zero position size stops generation for the rest of the slice
/// - A trade still open after the loop is closed on the terminal bar
pub fn generate_signals<R>(
    rule: &R,
    ctx: &SignalContext<'_>,
    account: Account,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Session>
where
    R: Rule + ?Sized,
{
    let mut session = Session::new(account, ctx.conditions);
    let slice = ctx.asset.series().date_slice(start, end);
    let Some(&(terminal, _)) = slice.last() else {
        return Ok(session);
    };

    for &(t, _) in &slice {
        let buy = rule.buy(t, &session);
        let sell = rule.sell(t, &session);
        if !buy && !sell {
            continue;
        }
        match process_signal(ctx, &mut session, t, terminal, buy, sell)? {
            Step::Continue => {}
            Step::Stop => break,
        }
    }

    if session.last_trade().is_some_and(Trade::is_open) {
        session.close_last_trade(terminal)?;
    }

    debug!(
        rule = rule.name(),
        symbol = ctx.asset.symbol(),
        trades = session.trades().len(),
        sharpe = session.sharpe_ratio(),
        "signal generation finished"
    );
    Ok(session)
}

fn process_signal(
    ctx: &SignalContext<'_>,
    session: &mut Session,
    t: NaiveDateTime,
    terminal: NaiveDateTime,
    buy: bool,
    sell: bool,
) -> Result<Step> {
    if session.in_market(t) {
        let held = session.last_trade().map(Trade::side);
        let opposing = matches!(
            (held, buy, sell),
            (Some(TradeSide::Long), _, true) | (Some(TradeSide::Short), true, _)
        );
        if opposing {
            session.close_last_trade(t)?;
        }
        return Ok(Step::Continue);
    }

    if t >= terminal {
        return Ok(Step::Stop);
    }

    let size = ctx.money_manager.size_position(session.account(), t)?;
    if size == 0 {
        debug!(
            sizer = ctx.money_manager.name(),
            time = %t,
            balance = session.account().current_balance(),
            "position size is zero, stopping"
        );
        return Ok(Step::Stop);
    }

    let side = if buy { TradeSide::Long } else { TradeSide::Short };
    let trade = Trade::new(ctx.asset.clone(), t, None, size, side, ctx.conditions)?;
    session.add_trade(trade)?;
    Ok(Step::Continue)
}
