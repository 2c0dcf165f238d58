//! Trading rules: buy/sell decision policies.
//!
//! A [`Rule`] answers two questions at a timestamp given the session so far:
//! should we buy, and should we sell. Rules are pure: they may read the
//! session, its account and the asset's series but never mutate them.
//!
//! The engine owns the consequences (sizing, opening, closing), so any rule
//! can be swapped in without touching the session, account or optimizer.

pub mod buy_zone;

pub use buy_zone::{BuyZoneModel, BuyZoneParams};

use chrono::NaiveDateTime;

use crate::domain::Account;
use crate::engine::{Session, SignalContext};
use crate::error::Result;

pub trait Rule: Send + Sync {
    /// Rule name for logging
    fn name(&self) -> &str;

    fn buy(&self, t: NaiveDateTime, session: &Session) -> bool;

    fn sell(&self, t: NaiveDateTime, session: &Session) -> bool;

    /// Run this rule over `[start, end]`. See
    /// [`generate_signals`](crate::engine::generate_signals).
    fn generate_signals(
        &self,
        ctx: &SignalContext<'_>,
        account: Account,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Session> {
        crate::engine::generate_signals(self, ctx, account, start, end)
    }
}
