//! Prices in minor currency units.
//!
//! Amounts are kept as whole kopecks (`i64`) everywhere: in the database,
//! in order totals and in invoice `LabeledPrice` amounts, which Telegram
//! also expects in the smallest units of the currency.

use std::fmt;
use std::str::FromStr;

use crate::core::error::AppError;

/// An amount of money in minor units (kopecks, cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(pub i64);

impl Money {
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Price of `quantity` units, `None` on overflow.
    pub fn times(self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    /// Amount as accepted by `LabeledPrice`, which is a `u32`.
    pub fn to_invoice_amount(self) -> Result<u32, AppError> {
        u32::try_from(self.0).map_err(|_| AppError::AmountTooLarge(self.0))
    }
}

impl fmt::Display for Money {
    /// Formats as `major.minor`, e.g. `1299.90`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = AppError;

    /// Parses `"199"`, `"199.9"`, `"199.90"` or `"199,90"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().replace(',', ".");
        let invalid = || AppError::Validation(format!("Invalid price: {:?}", s));

        let (major, minor) = match raw.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (raw.as_str(), ""),
        };
        if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if minor.len() > 2 || !minor.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = major.parse().map_err(|_| invalid())?;
        let minor: i64 = match minor.len() {
            0 => 0,
            1 => minor.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => minor.parse().map_err(|_| invalid())?,
        };

        major
            .checked_mul(100)
            .and_then(|m| m.checked_add(minor))
            .map(Money)
            .ok_or_else(invalid)
    }
}
