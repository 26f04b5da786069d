//! Money type backed by integer minor units
//!
//! All monetary values in Vendora are stored as signed integer minor units
//! (cents for USD, whole yen for JPY). This provides:
//! - Exact arithmetic with overflow checking
//! - Support for negative values (reversals are negative mirrors)
//! - Currency-aware operations
//!
//! Rates are `rust_decimal::Decimal`; the single rounding mode for the whole
//! engine is half-up (midpoint away from zero) to the currency's minor unit.

use crate::{CurrencyCode, Result, VendoraError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A signed amount in integer minor units of a currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Raw value in minor units (e.g. cents)
    pub minor: i64,
    /// The currency
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount from minor units
    pub fn new(minor: i64, currency: CurrencyCode) -> Self {
        Self { minor, currency }
    }

    /// Create a zero amount
    pub fn zero(currency: CurrencyCode) -> Self {
        Self { minor: 0, currency }
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Check if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Check if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Get the absolute value
    pub fn abs(&self) -> Self {
        Self {
            minor: self.minor.abs(),
            ..*self
        }
    }

    /// Negate the amount
    pub fn negate(&self) -> Self {
        Self {
            minor: -self.minor,
            ..*self
        }
    }

    /// Checked addition (currencies must match)
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.require_same_currency(&other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(VendoraError::AmountOverflow)?;
        Ok(Self { minor, ..self })
    }

    /// Checked subtraction (currencies must match)
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.require_same_currency(&other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .ok_or(VendoraError::AmountOverflow)?;
        Ok(Self { minor, ..self })
    }

    /// Multiply by a decimal rate, rounding half-up to the minor unit
    ///
    /// This is the only place a fractional intermediate exists; the result is
    /// always a whole number of minor units.
    pub fn apply_rate(self, rate: Decimal) -> Result<Self> {
        let product = Decimal::from(self.minor)
            .checked_mul(rate)
            .ok_or(VendoraError::AmountOverflow)?;
        let rounded = product.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let minor = rounded.to_i64().ok_or(VendoraError::AmountOverflow)?;
        Ok(Self { minor, ..self })
    }

    fn require_same_currency(&self, other: &Self) -> Result<()> {
        if self.currency != other.currency {
            return Err(VendoraError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: other.currency.code().to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    /// Renders the major-unit form, e.g. `-12.50 USD` or `980 JPY`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.currency.minor_units();
        if units == 0 {
            return write!(f, "{} {}", self.minor, self.currency);
        }
        let scale = 10i64.pow(units as u32);
        let whole = self.minor / scale;
        let frac = (self.minor % scale).abs();
        let sign = if self.minor < 0 && whole == 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0width$} {}",
            sign,
            whole,
            frac,
            self.currency,
            width = units as usize
        )
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.minor.partial_cmp(&other.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(minor: i64) -> Money {
        Money::new(minor, CurrencyCode::USD)
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = usd(10_000);
        let b = usd(2_500);
        assert_eq!(a.checked_add(b).unwrap(), usd(12_500));
        assert_eq!(a.checked_sub(b).unwrap(), usd(7_500));
    }

    #[test]
    fn test_currency_mismatch() {
        let a = usd(100);
        let b = Money::new(100, CurrencyCode::EUR);
        assert!(matches!(
            a.checked_add(b),
            Err(VendoraError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 125 * 0.10 = 12.5 -> 13
        assert_eq!(usd(125).apply_rate(dec!(0.10)).unwrap(), usd(13));
        // 124 * 0.10 = 12.4 -> 12
        assert_eq!(usd(124).apply_rate(dec!(0.10)).unwrap(), usd(12));
        // Midpoint away from zero for negatives: -12.5 -> -13
        assert_eq!(usd(-125).apply_rate(dec!(0.10)).unwrap(), usd(-13));
    }

    #[test]
    fn test_negate_and_abs() {
        let a = usd(900);
        assert_eq!(a.negate(), usd(-900));
        assert_eq!(a.negate().abs(), a);
        assert!(a.negate().is_negative());
    }

    #[test]
    fn test_display() {
        assert_eq!(usd(10_050).to_string(), "100.50 USD");
        assert_eq!(usd(-50).to_string(), "-0.50 USD");
        assert_eq!(Money::new(980, CurrencyCode::JPY).to_string(), "980 JPY");
    }

    #[test]
    fn test_ordering_same_currency_only() {
        assert!(usd(100) > usd(50));
        let eur = Money::new(100, CurrencyCode::EUR);
        assert_eq!(usd(100).partial_cmp(&eur), None);
    }
}
