//! # Error Types
//!
//! Domain-specific error types for ticketing-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ticketing-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Per-field input failures                       │
//! │                                                                         │
//! │  ticketing-db errors (separate crate)                                  │
//! │  └── DbError          - Database failures, lock conflicts              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A document number was requested for a ticket that already has one.
    ///
    /// Numbers are assigned exactly once; reaching this is a programming
    /// error in the caller, never a reason to re-number.
    #[error("Ticket already carries document number {document_number}")]
    AlreadyNumbered { document_number: String },

    /// The nine-digit document sequence has no successor.
    #[error("Document number sequence exhausted after {previous}")]
    SequenceExhausted { previous: u64 },

    /// A decimal operation left the representable range.
    #[error("Arithmetic overflow while computing {operation}")]
    ArithmeticOverflow { operation: &'static str },

    /// A ticket must carry at least one line item.
    #[error("A ticket must have at least one product")]
    EmptyTicket,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::ArithmeticOverflow`].
    pub fn overflow(operation: &'static str) -> Self {
        CoreError::ArithmeticOverflow { operation }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Every variant names the offending field so a presentation layer can
/// report failures per field.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly greater than zero.
    #[error("{field} must be greater than 0")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} cannot be negative")]
    MustNotBeNegative { field: String },

    /// Decimal value is out of range.
    #[error("{field} must be between {min} and {max}")]
    DecimalOutOfRange {
        field: String,
        min: Decimal,
        max: Decimal,
    },

    /// Decimal value carries more fraction digits than storage keeps.
    #[error("{field} must have at most {max} decimal places")]
    TooManyDecimalPlaces { field: String, max: u32 },

    /// Invalid format (e.g., non-numeric document number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Name of the field this error is about.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::DecimalOutOfRange { field, .. }
            | ValidationError::TooManyDecimalPlaces { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
