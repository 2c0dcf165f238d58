//! Position Sizers: determine trade quantity
//!
//! Sizers translate the account balance into a whole-share quantity.
//! They are account-aware but signal-agnostic: the same size is returned
//! whether the rule is about to go long or short.

pub mod fixed_fraction;

pub use fixed_fraction::FixedFractionSizer;

use chrono::NaiveDateTime;

use crate::domain::Account;
use crate::error::Result;

/// Position sizing policy
///
/// # Responsibilities
/// - Convert account balance + price at `t` → whole-share quantity
/// - Return 0 when the account cannot afford a single share
///
/// # Non-Responsibilities
/// - Sizers do NOT decide entry/exit (that's the rule's job)
/// - Sizers do NOT mutate the account
pub trait MoneyManagementStrategy: Send + Sync {
    /// Number of shares to trade at `t`.
    fn size_position(&self, account: &Account, t: NaiveDateTime) -> Result<u32>;

    /// Sizer name for logging
    fn name(&self) -> &str;
}
