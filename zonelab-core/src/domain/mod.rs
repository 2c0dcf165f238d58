//! Domain types for ZoneLab

pub mod account;
pub mod asset;
pub mod ids;
pub mod trade;

pub use account::Account;
pub use asset::{Asset, Conditions};
pub use ids::TradeId;
pub use trade::{Trade, TradeSide};
