//! Unit prices in US dollars using decimal arithmetic.
//!
//! The shop sells in a single currency. A [`Price`] is always positive and has
//! at most two decimal places, so it maps exactly onto the payment provider's
//! integer cent amounts.

use core::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Upper bound for a single unit price.
const MAX_PRICE_DOLLARS: i64 = 1_000_000;

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    Invalid,
    /// Zero or negative.
    #[error("price must be greater than zero")]
    NotPositive,
    /// More than two digits after the decimal point.
    #[error("price can have at most two decimal places")]
    TooPrecise,
    /// Above the allowed maximum.
    #[error("price must be less than $1,000,000")]
    TooLarge,
}

/// A positive unit price in dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the amount is not positive, has more than two
    /// decimal places, or exceeds the maximum.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        if amount >= Decimal::from(MAX_PRICE_DOLLARS) {
            return Err(PriceError::TooLarge);
        }
        let mut amount = amount;
        amount.rescale(2);
        Ok(Self(amount))
    }

    /// Parse a price typed into a form, e.g. `"19.99"` or `"$5"`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Invalid`] for non-numeric input, otherwise the
    /// same errors as [`Price::new`].
    pub fn parse(input: &str) -> Result<Self, PriceError> {
        let cleaned = input.trim().trim_start_matches('$').trim();
        let amount = Decimal::from_str(cleaned).map_err(|_| PriceError::Invalid)?;
        Self::new(amount)
    }

    /// Build a price from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Same as [`Price::new`].
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The amount in dollars, always with two decimal places.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount in cents, as the payment provider expects it.
    #[must_use]
    pub fn cents(&self) -> i64 {
        // Bounded by MAX_PRICE_DOLLARS, so the mantissa always fits.
        i64::try_from(self.0.mantissa()).unwrap_or(i64::MAX)
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Decimal {
        self.0 * Decimal::from(quantity)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Format a dollar amount for display, e.g. `$20.00`.
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("${rounded}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_inputs() {
        assert_eq!(Price::parse("10").unwrap().to_string(), "10.00");
        assert_eq!(Price::parse(" $19.9 ").unwrap().to_string(), "19.90");
        assert_eq!(Price::parse("0.01").unwrap().cents(), 1);
    }

    #[test]
    fn test_parse_rejects_bad_inputs() {
        assert_eq!(Price::parse("ten"), Err(PriceError::Invalid));
        assert_eq!(Price::parse(""), Err(PriceError::Invalid));
        assert_eq!(Price::parse("0"), Err(PriceError::NotPositive));
        assert_eq!(Price::parse("-3.50"), Err(PriceError::NotPositive));
        assert_eq!(Price::parse("1.999"), Err(PriceError::TooPrecise));
        assert_eq!(Price::parse("1000000"), Err(PriceError::TooLarge));
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        assert_eq!(Price::parse("4.500").unwrap().cents(), 450);
    }

    #[test]
    fn test_cents_round_trip() {
        let price = Price::from_cents(1999).unwrap();
        assert_eq!(price.cents(), 1999);
        assert_eq!(price.amount(), Decimal::new(1999, 2));
    }

    #[test]
    fn test_times_quantity() {
        let price = Price::parse("10").unwrap();
        assert_eq!(format_usd(price.times(2)), "$20.00");
    }

    #[test]
    fn test_format_usd_rounds_to_cents() {
        assert_eq!(format_usd(Decimal::new(5, 0)), "$5.00");
        assert_eq!(format_usd(Decimal::new(12_345, 3)), "$12.35");
    }

    #[test]
    fn test_serde_uses_decimal_string_and_validates() {
        let price = Price::parse("12.5").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"12.50\"");
        assert_eq!(serde_json::from_str::<Price>(&json).unwrap(), price);
        assert!(serde_json::from_str::<Price>("\"-1\"").is_err());
    }
}
