//! Backtesting engine: session ledger and signal generation.
//!
//! The engine walks a price series chronologically, asks a [`Rule`] for
//! buy/sell decisions at each timestamp, and records the resulting trades in a
//! [`Session`]:
//!
//! 1. Flat + signal: size a new trade and open it (debit at open + 1s)
//! 2. In market + opposing signal: close the open trade (credit at close)
//! 3. End of slice: force-close any open trade
//!
//! [`Rule`]: crate::rules::Rule

pub mod session;
pub mod signals;
pub mod stats;

pub use session::{Session, SessionState, NO_TRADES_SHARPE, ZERO_DEVIATION_DENOMINATOR};
pub use signals::{generate_signals, SignalContext};
pub use stats::{RunningStats, SessionStatistics};
