//! # ticketing-core: Pure Business Logic for Sales Tickets
//!
//! This crate holds the ticket arithmetic and the document numbering rules
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ticketing Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Callers (web views, admin, print / export jobs)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ ticketing-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  amount   │  │ calculator │  │ validation│  │   │
//! │  │   │  Ticket   │  │  Amount   │  │ line total │  │   rules   │  │   │
//! │  │   │  Company  │  │ 8 digits  │  │ IVA, total │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  ticketing-db (Database Layer)                  │   │
//! │  │        SQLite queries, migrations, sequencer, repositories      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Company, Ticket, TicketDetail, DocumentNumber, ...)
//! - [`amount`] - Decimal amount type fixed at 8 fraction digits
//! - [`calculator`] - Line total, subtotal, IVA and grand total
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Exact Decimals**: amounts never pass through binary floating point
//! 4. **Explicit Errors**: overflow and bad input are typed errors, never panics
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use ticketing_core::calculator::{compute_line_total, TicketTotals};
//! use ticketing_core::types::TaxPercentage;
//!
//! let line = compute_line_total(Decimal::new(2, 0), Decimal::new(5000, 2)).unwrap();
//! assert_eq!(line.to_string(), "100.00000000");
//!
//! let iva = TaxPercentage::new(Decimal::new(15, 0)).unwrap();
//! let totals = TicketTotals::compute([line], iva).unwrap();
//! assert_eq!(totals.total.to_string(), "115.00000000");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod amount;
pub mod calculator;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use amount::Amount;
pub use calculator::TicketTotals;
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fraction digits kept on every stored amount, quantity and unit price.
pub const AMOUNT_SCALE: u32 = 8;

/// Fraction digits kept on tax percentages.
pub const TAX_PERCENTAGE_SCALE: u32 = 2;

/// Width of a formatted document number (`000000042`).
pub const DOCUMENT_NUMBER_WIDTH: usize = 9;

/// Largest sequence value that fits in [`DOCUMENT_NUMBER_WIDTH`] digits.
pub const MAX_DOCUMENT_SEQUENCE: u64 = 999_999_999;

/// Maximum length of free-text fields (seller, client, product, company name).
pub const MAX_TEXT_LENGTH: usize = 255;

/// Maximum length of short code fields (CI/RUC, phone, plate).
pub const MAX_CODE_LENGTH: usize = 20;

/// Minimum length of a company RUC.
pub const MIN_RUC_LENGTH: usize = 10;

/// Default number of rows per page in ticket and company listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
