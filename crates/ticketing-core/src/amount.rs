//! # Amount Module
//!
//! Provides the `Amount` type for monetary values and line totals.
//!
//! ## Why a Fixed-Scale Decimal?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Quantities here are fractional (0.25 kg, 1.5 h), so integer cents     │
//! │  cannot hold a line total either.                                       │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 decimal pinned at 8 fraction digits             │
//! │    2.50000000 × 3.33333333 = 8.33333333 (half-even at digit 8)          │
//! │    Every stored total has exactly the same scale                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use ticketing_core::amount::Amount;
//!
//! let total = Amount::new(Decimal::new(155, 1)); // 15.5
//! assert_eq!(total.to_string(), "15.50000000");
//!
//! let parsed: Amount = "10.00000000".parse().unwrap();
//! assert_eq!(parsed.checked_add(total).unwrap().to_string(), "25.50000000");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::AMOUNT_SCALE;

// =============================================================================
// Amount Type
// =============================================================================

/// A decimal value held at exactly [`AMOUNT_SCALE`] fraction digits.
///
/// ## Design Decisions
/// - **Fixed scale**: every constructor rounds half-to-even and rescales, so
///   `Display` and storage always show 8 fraction digits
/// - **Checked arithmetic only**: overflow surfaces as `None`, never a panic
/// - **Serde as string**: `"15.50000000"`, so no JSON consumer sees a float
///
/// ## Where Amount is Used
/// ```text
/// TicketDetail.quantity × TicketDetail.unit_price ──► TicketDetail.total
///                                                          │
///                                      Σ details ──► subtotal ──► IVA ──► Ticket.total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Creates an amount, rounding half-to-even to 8 fraction digits.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use ticketing_core::amount::Amount;
    ///
    /// // 0.000000005 sits exactly on the midpoint: rounds to the even digit
    /// let tiny = Amount::new(Decimal::new(5, 9));
    /// assert!(tiny.is_zero());
    ///
    /// let tiny = Amount::new(Decimal::new(15, 9));
    /// assert_eq!(tiny.to_string(), "0.00000002");
    /// ```
    ///
    /// A value whose integer part leaves no room for 8 fraction digits keeps
    /// a smaller scale; arithmetic goes through [`Amount::try_new`] instead.
    pub fn new(value: Decimal) -> Self {
        Amount(normalize(value))
    }

    /// Creates an amount, or `None` when the value cannot be held at 8
    /// fraction digits (integer part above roughly 7.9 × 10²⁰).
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use ticketing_core::amount::Amount;
    ///
    /// assert!(Amount::try_new(Decimal::new(155, 1)).is_some());
    /// let too_large: Decimal = "1000000000000000000000".parse().unwrap();
    /// assert!(Amount::try_new(too_large).is_none());
    /// ```
    pub fn try_new(value: Decimal) -> Option<Self> {
        let normalized = normalize(value);
        (normalized.scale() == AMOUNT_SCALE).then_some(Amount(normalized))
    }

    /// Returns zero at full scale (`0.00000000`).
    #[inline]
    pub fn zero() -> Self {
        Amount::new(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    #[inline]
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).and_then(Amount::try_new)
    }

    /// Subtracts `other`, returning `None` on overflow.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).and_then(Amount::try_new)
    }
}

/// Rounds to [`AMOUNT_SCALE`] digits (half-to-even) and pads the scale up to it.
fn normalize(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(AMOUNT_SCALE);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::zero()
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Parses the canonical text form stored in the database.
impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Amount::new)
            .map_err(|e| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: e.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scale_is_always_eight() {
        assert_eq!(Amount::new(dec!(15.5)).to_string(), "15.50000000");
        assert_eq!(Amount::new(dec!(7)).to_string(), "7.00000000");
        assert_eq!(Amount::zero().to_string(), "0.00000000");
    }

    #[test]
    fn test_rounding_is_half_even() {
        assert_eq!(Amount::new(dec!(1.000000005)).to_string(), "1.00000000");
        assert_eq!(Amount::new(dec!(1.000000015)).to_string(), "1.00000002");
        assert_eq!(Amount::new(dec!(1.000000016)).to_string(), "1.00000002");
    }

    #[test]
    fn test_negative_zero_is_normalized() {
        let amount = Amount::new(dec!(-0.000000001));
        assert!(amount.is_zero());
        assert!(!amount.is_negative());
        assert_eq!(amount.to_string(), "0.00000000");
    }

    #[test]
    fn test_parse() {
        let amount: Amount = "10.5".parse().unwrap();
        assert_eq!(amount.value(), dec!(10.50000000));
        assert!("ten".parse::<Amount>().is_err());
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Amount::new(Decimal::MAX.trunc());
        assert!(max.checked_add(max).is_none());
    }

    #[test]
    fn test_try_new_requires_full_scale() {
        let fits = Amount::try_new(dec!(790000000000000000000)).unwrap();
        assert_eq!(fits.value().scale(), AMOUNT_SCALE);

        assert!(Amount::try_new(dec!(1000000000000000000000)).is_none());
        assert!(Amount::try_new(dec!(9999999899999900000001)).is_none());
    }

    #[test]
    fn test_checked_add_loses_no_scale() {
        let half = Amount::try_new(dec!(500000000000000000000)).unwrap();
        // 10²¹ is representable as a Decimal, just not with 8 fraction digits
        assert!(half.checked_add(half).is_none());
        assert_eq!(
            half.checked_sub(half).unwrap().to_string(),
            "0.00000000"
        );
    }

    #[test]
    fn test_serde_uses_strings() {
        let amount = Amount::new(dec!(15.5));
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"15.50000000\"");

        let back: Amount = serde_json::from_str("\"3.1\"").unwrap();
        assert_eq!(back.to_string(), "3.10000000");
    }
}
