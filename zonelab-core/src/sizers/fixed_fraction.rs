//! Fixed-fraction sizer
//!
//! Commit a fixed fraction of the current balance to each trade.

use chrono::NaiveDateTime;

use crate::domain::{Account, Asset};
use crate::error::{BacktestError, Result};
use crate::series::round_half_up;
use crate::sizers::MoneyManagementStrategy;

/// Decimal places the raw share quotient is rounded to before flooring, so
/// representation noise like `19.9999999` still sizes 20 shares.
const SHARE_QUOTIENT_DECIMALS: u32 = 2;

/// `floor(balance * ratio / price(t))` shares.
#[derive(Debug, Clone)]
pub struct FixedFractionSizer {
    ratio: f64,
    asset: Asset,
}

impl FixedFractionSizer {
    /// `ratio` must lie in `(0, 1]`.
    pub fn new(ratio: f64, asset: Asset) -> Result<Self> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(BacktestError::config(format!(
                "allocation ratio must be in (0, 1], got {ratio}"
            )));
        }
        Ok(Self { ratio, asset })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl MoneyManagementStrategy for FixedFractionSizer {
    fn size_position(&self, account: &Account, t: NaiveDateTime) -> Result<u32> {
        let price = self.asset.require_price(t)?;
        if price <= 0.0 {
            return Err(BacktestError::data(format!(
                "cannot size a position at non-positive price {price} ({t})"
            )));
        }
        let budget = account.current_balance() * self.ratio;
        let shares = round_half_up(budget / price, SHARE_QUOTIENT_DECIMALS).floor();
        Ok(shares.clamp(0.0, f64::from(u32::MAX)) as u32)
    }

    fn name(&self) -> &str {
        "FixedFraction"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn t() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn asset_at(price: f64) -> Asset {
        let series = TimeSeries::from_points([(t(), price)]).unwrap();
        Asset::new("SPY", Arc::new(series))
    }

    #[test]
    fn sizes_fraction_of_balance() {
        let sizer = FixedFractionSizer::new(0.2, asset_at(10.0)).unwrap();
        let account = Account::new(1000.0, t()).unwrap();
        assert_eq!(sizer.size_position(&account, t()).unwrap(), 20);
    }

    #[test]
    fn small_account_sizes_zero() {
        let sizer = FixedFractionSizer::new(0.2, asset_at(10.0)).unwrap();
        let account = Account::new(9.0, t()).unwrap();
        assert_eq!(sizer.size_position(&account, t()).unwrap(), 0);
    }

    #[test]
    fn rounds_down_to_whole_shares() {
        let sizer = FixedFractionSizer::new(0.75, asset_at(33.0)).unwrap();
        let account = Account::new(1000.0, t()).unwrap();
        // 750 / 33 = 22.72...
        assert_eq!(sizer.size_position(&account, t()).unwrap(), 22);
    }

    #[test]
    fn ratio_must_be_in_unit_interval() {
        assert!(FixedFractionSizer::new(0.0, asset_at(10.0)).is_err());
        assert!(FixedFractionSizer::new(1.01, asset_at(10.0)).is_err());
        assert!(FixedFractionSizer::new(f64::NAN, asset_at(10.0)).is_err());
        assert!(FixedFractionSizer::new(1.0, asset_at(10.0)).is_ok());
    }

    #[test]
    fn missing_price_is_an_error() {
        let sizer = FixedFractionSizer::new(0.5, asset_at(10.0)).unwrap();
        let account = Account::new(1000.0, t()).unwrap();
        let later = t() + chrono::Duration::minutes(1);
        assert!(matches!(
            sizer.size_position(&account, later),
            Err(BacktestError::DataIntegrity(_))
        ));
    }
}
