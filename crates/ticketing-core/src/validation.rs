//! # Validation Module
//!
//! Input validation for companies, ticket headers and line items.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (forms, admin)                                        │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - runs before any transaction begins             │
//! │  ├── Text lengths, required fields                                     │
//! │  └── quantity > 0, unit_price >= 0, 0 <= IVA <= 100                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── document_number immutability trigger                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::{AMOUNT_SCALE, MAX_CODE_LENGTH, MIN_RUC_LENGTH, TAX_PERCENTAGE_SCALE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted listing search term.
pub const MAX_SEARCH_LENGTH: usize = 100;

/// Largest accepted page size for listings.
pub const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most `max` characters
///
/// ## Example
/// ```rust
/// use ticketing_core::validation::validate_required_text;
///
/// assert!(validate_required_text("client", "Ana Torres", 255).is_ok());
/// assert!(validate_required_text("client", "   ", 255).is_err());
/// ```
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an optional free-text field; `None` and blank are accepted.
pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.trim().chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a company RUC (taxpayer registry number).
///
/// ## Rules
/// - Required
/// - Between 10 and 20 characters
pub fn validate_ruc(ruc: &str) -> ValidationResult<()> {
    validate_required_text("ruc", ruc, MAX_CODE_LENGTH)?;

    if ruc.trim().chars().count() < MIN_RUC_LENGTH {
        return Err(ValidationError::TooShort {
            field: "ruc".to_string(),
            min: MIN_RUC_LENGTH,
        });
    }

    Ok(())
}

/// Validates a listing search query.
///
/// ## Returns
/// The trimmed query, or `None` when it is blank (no filtering).
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_LENGTH {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: MAX_SEARCH_LENGTH,
        });
    }

    Ok((!query.is_empty()).then(|| query.to_string()))
}

// =============================================================================
// Decimal Validators
// =============================================================================

/// Rejects values with more fraction digits than storage keeps.
pub fn validate_decimal_places(field: &str, value: Decimal, max: u32) -> ValidationResult<()> {
    if value.normalize().scale() > max {
        return Err(ValidationError::TooManyDecimalPlaces {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a line-item quantity.
///
/// ## Rules
/// - Must be strictly positive (> 0)
/// - At most 8 fraction digits
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use ticketing_core::validation::validate_quantity;
///
/// assert!(validate_quantity(Decimal::new(25, 2)).is_ok()); // 0.25
/// assert!(validate_quantity(Decimal::ZERO).is_err());
/// ```
pub fn validate_quantity(quantity: Decimal) -> ValidationResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    validate_decimal_places("quantity", quantity, AMOUNT_SCALE)
}

/// Validates a line-item unit price.
///
/// ## Rules
/// - Must be non-negative (>= 0); zero is allowed (free items)
/// - At most 8 fraction digits
pub fn validate_unit_price(unit_price: Decimal) -> ValidationResult<()> {
    if unit_price < Decimal::ZERO {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        });
    }

    validate_decimal_places("unit_price", unit_price, AMOUNT_SCALE)
}

/// Validates an IVA percentage.
///
/// ## Rules
/// - Between 0 and 100 inclusive
/// - At most 2 fraction digits (`12.00`, `15`, `0.5`)
pub fn validate_tax_percentage(percentage: Decimal) -> ValidationResult<()> {
    if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(ValidationError::DecimalOutOfRange {
            field: "tax_percentage".to_string(),
            min: Decimal::ZERO,
            max: Decimal::ONE_HUNDRED,
        });
    }

    validate_decimal_places("tax_percentage", percentage, TAX_PERCENTAGE_SCALE)
}

// =============================================================================
// Paging
// =============================================================================

/// Validates a 1-based page number and page size.
pub fn validate_page(page: u32, per_page: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if per_page == 0 || per_page > MAX_PAGE_SIZE {
        return Err(ValidationError::DecimalOutOfRange {
            field: "per_page".to_string(),
            min: Decimal::ONE,
            max: Decimal::from(MAX_PAGE_SIZE),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("seller", "Luis", 255).is_ok());
        assert!(validate_required_text("seller", "", 255).is_err());
        assert!(validate_required_text("plate", &"A".repeat(21), 20).is_err());
        // Length counts characters, not bytes
        assert!(validate_required_text("client", &"ñ".repeat(20), 20).is_ok());
    }

    #[test]
    fn test_validate_optional_text() {
        assert!(validate_optional_text("client_ruc", None, 20).is_ok());
        assert!(validate_optional_text("client_ruc", Some(""), 20).is_ok());
        assert!(validate_optional_text("client_ruc", Some(&"9".repeat(21)), 20).is_err());
    }

    #[test]
    fn test_validate_ruc() {
        assert!(validate_ruc("0990000000001").is_ok());
        assert!(matches!(
            validate_ruc("123"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(matches!(
            validate_ruc(&"1".repeat(21)),
            Err(ValidationError::TooLong { .. })
        ));
        assert!(matches!(validate_ruc(""), Err(ValidationError::Required { .. })));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(dec!(1)).is_ok());
        assert!(validate_quantity(dec!(0.00000001)).is_ok());

        assert!(matches!(
            validate_quantity(dec!(0)),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_quantity(dec!(-1)).is_err());
        assert!(matches!(
            validate_quantity(dec!(0.000000001)),
            Err(ValidationError::TooManyDecimalPlaces { .. })
        ));
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(dec!(0)).is_ok());
        assert!(validate_unit_price(dec!(10.99)).is_ok());
        assert!(matches!(
            validate_unit_price(dec!(-0.01)),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_places() {
        assert!(validate_unit_price(dec!(1.0000000000)).is_ok());
        assert!(validate_tax_percentage(dec!(12.000)).is_ok());
    }

    #[test]
    fn test_validate_tax_percentage() {
        assert!(validate_tax_percentage(dec!(0)).is_ok());
        assert!(validate_tax_percentage(dec!(12.00)).is_ok());
        assert!(validate_tax_percentage(dec!(100)).is_ok());
        assert!(validate_tax_percentage(dec!(100.01)).is_err());
        assert!(validate_tax_percentage(dec!(-1)).is_err());
        assert!(validate_tax_percentage(dec!(12.345)).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  ana ").unwrap(), Some("ana".to_string()));
        assert_eq!(validate_search_query("   ").unwrap(), None);
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(1, 10).is_ok());
        assert!(validate_page(0, 10).is_err());
        assert!(validate_page(1, 0).is_err());
        assert!(validate_page(1, 101).is_err());
    }
}
