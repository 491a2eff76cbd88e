//! # Tax & Total Calculator
//!
//! Keeps `TicketDetail.total` and `Ticket.total` consistent with their inputs.
//!
//! ## Ticket Math
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  detail.total = quantity × unit_price                    (per line)     │
//! │                                                                         │
//! │  subtotal     = Σ detail.total                           (0 if empty)   │
//! │  tax_amount   = subtotal × tax_percentage / 100                         │
//! │  total        = subtotal + tax_amount                                   │
//! │                                                                         │
//! │  Every result is rounded half-to-even at 8 fraction digits.            │
//! │  tax_percentage is the snapshot stored on the ticket, never the        │
//! │  company's current rate.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All functions are pure; writing the results back is the caller's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::{CoreError, CoreResult};
use crate::types::TaxPercentage;
use crate::validation::{validate_quantity, validate_unit_price};

// =============================================================================
// Line Items
// =============================================================================

/// Computes a line total: `quantity × unit_price`.
///
/// ## Errors
/// - `quantity <= 0` → [`ValidationError::MustBePositive`](crate::ValidationError)
/// - `unit_price < 0` → [`ValidationError::MustNotBeNegative`](crate::ValidationError)
/// - product out of range → [`CoreError::ArithmeticOverflow`]
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use ticketing_core::calculator::compute_line_total;
///
/// // 2.5 × 3.99
/// let total = compute_line_total(Decimal::new(25, 1), Decimal::new(399, 2)).unwrap();
/// assert_eq!(total.to_string(), "9.97500000");
/// ```
pub fn compute_line_total(quantity: Decimal, unit_price: Decimal) -> CoreResult<Amount> {
    validate_quantity(quantity)?;
    validate_unit_price(unit_price)?;

    quantity
        .checked_mul(unit_price)
        .and_then(Amount::try_new)
        .ok_or_else(|| CoreError::overflow("line total"))
}

// =============================================================================
// Ticket Totals
// =============================================================================

/// Sums line totals. Order is irrelevant; an empty set yields zero.
pub fn compute_subtotal<I>(line_totals: I) -> CoreResult<Amount>
where
    I: IntoIterator<Item = Amount>,
{
    line_totals
        .into_iter()
        .try_fold(Amount::zero(), |acc, line| {
            acc.checked_add(line)
                .ok_or_else(|| CoreError::overflow("subtotal"))
        })
}

/// Computes the IVA amount: `subtotal × tax_percentage / 100`.
pub fn compute_tax_amount(subtotal: Amount, tax_percentage: TaxPercentage) -> CoreResult<Amount> {
    subtotal
        .value()
        .checked_mul(tax_percentage.value())
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .and_then(Amount::try_new)
        .ok_or_else(|| CoreError::overflow("tax amount"))
}

/// Computes the grand total: `subtotal + tax_amount`.
pub fn compute_grand_total(subtotal: Amount, tax_amount: Amount) -> CoreResult<Amount> {
    subtotal
        .checked_add(tax_amount)
        .ok_or_else(|| CoreError::overflow("grand total"))
}

/// Subtotal, IVA and grand total of one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTotals {
    pub subtotal: Amount,
    pub tax_amount: Amount,
    pub total: Amount,
}

impl TicketTotals {
    /// Computes all three figures from a ticket's line totals.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use ticketing_core::{Amount, TaxPercentage, TicketTotals};
    ///
    /// let lines = [Amount::new(Decimal::new(10, 0)), Amount::new(Decimal::new(55, 1))];
    /// let iva = TaxPercentage::new(Decimal::new(12, 0)).unwrap();
    ///
    /// let totals = TicketTotals::compute(lines, iva).unwrap();
    /// assert_eq!(totals.subtotal.to_string(), "15.50000000");
    /// assert_eq!(totals.tax_amount.to_string(), "1.86000000");
    /// assert_eq!(totals.total.to_string(), "17.36000000");
    /// ```
    pub fn compute<I>(line_totals: I, tax_percentage: TaxPercentage) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Amount>,
    {
        let subtotal = compute_subtotal(line_totals)?;
        Self::from_subtotal(subtotal, tax_percentage)
    }

    /// Computes IVA and grand total for an already known subtotal.
    pub fn from_subtotal(subtotal: Amount, tax_percentage: TaxPercentage) -> CoreResult<Self> {
        let tax_amount = compute_tax_amount(subtotal, tax_percentage)?;
        let total = compute_grand_total(subtotal, tax_amount)?;

        Ok(TicketTotals {
            subtotal,
            tax_amount,
            total,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
