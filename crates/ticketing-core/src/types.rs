//! # Domain Types
//!
//! Core domain types for companies, tickets and their line items.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │    Company      │   │      Ticket      │   │   TicketDetail   │     │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────  │     │
//! │  │  id             │◄──│  company_id      │◄──│  ticket_id       │     │
//! │  │  ruc (unique)   │   │  document_number │   │  product         │     │
//! │  │  tax_percentage │──►│  tax_percentage  │   │  quantity        │     │
//! │  │   (current)     │   │   (snapshot)     │   │  unit_price      │     │
//! │  └─────────────────┘   │  total           │   │  total           │     │
//! │                        └──────────────────┘   └──────────────────┘     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐                            │
//! │  │ TaxPercentage   │   │  DocumentNumber  │                            │
//! │  │  0.00 - 100.00  │   │  "000000042"     │                            │
//! │  └─────────────────┘   └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A ticket copies the company's IVA rate when it is created. Totals are
//! always recomputed from that copy, so changing the company's rate later
//! never rewrites history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;
use crate::calculator::{compute_line_total, TicketTotals};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::{
    validate_optional_text, validate_required_text, validate_ruc, validate_tax_percentage,
    ValidationResult,
};
use crate::{
    DEFAULT_PAGE_SIZE, DOCUMENT_NUMBER_WIDTH, MAX_CODE_LENGTH, MAX_DOCUMENT_SEQUENCE,
    MAX_TEXT_LENGTH, TAX_PERCENTAGE_SCALE,
};

// =============================================================================
// Tax Percentage
// =============================================================================

/// IVA rate as a percentage with two fraction digits (`12.00` = 12%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TaxPercentage(Decimal);

impl TaxPercentage {
    /// Creates a tax percentage.
    ///
    /// ## Errors
    /// Rejects values outside 0–100 or with more than two fraction digits.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use ticketing_core::TaxPercentage;
    ///
    /// let iva = TaxPercentage::new(Decimal::new(15, 0)).unwrap();
    /// assert_eq!(iva.to_string(), "15.00");
    /// assert!(TaxPercentage::new(Decimal::new(101, 0)).is_err());
    /// ```
    pub fn new(value: Decimal) -> ValidationResult<Self> {
        validate_tax_percentage(value)?;
        let mut value = value.normalize();
        value.rescale(TAX_PERCENTAGE_SCALE);
        Ok(TaxPercentage(value))
    }

    /// Returns the percentage as a decimal (`12.00`, not `0.12`).
    #[inline]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// The rate a company starts with when none is given: 12.00%.
impl Default for TaxPercentage {
    fn default() -> Self {
        TaxPercentage(Decimal::new(1200, TAX_PERCENTAGE_SCALE))
    }
}

impl fmt::Display for TaxPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for TaxPercentage {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        TaxPercentage::new(value)
    }
}

impl From<TaxPercentage> for Decimal {
    fn from(percentage: TaxPercentage) -> Self {
        percentage.0
    }
}

// =============================================================================
// Document Number
// =============================================================================

/// Fiscal document number: nine zero-padded decimal digits.
///
/// Fixed width keeps lexical order equal to numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentNumber(String);

impl DocumentNumber {
    /// Formats a sequence value (`42` → `"000000042"`).
    ///
    /// ## Errors
    /// - `0` is not a valid document number
    /// - values above 999 999 999 do not fit the width
    pub fn from_sequence(sequence: u64) -> CoreResult<Self> {
        if sequence == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "document_number".to_string(),
                reason: "sequence starts at 1".to_string(),
            }
            .into());
        }

        if sequence > MAX_DOCUMENT_SEQUENCE {
            return Err(CoreError::SequenceExhausted {
                previous: sequence - 1,
            });
        }

        Ok(DocumentNumber(format!(
            "{:0width$}",
            sequence,
            width = DOCUMENT_NUMBER_WIDTH
        )))
    }

    /// Strictly parses a stored document number (exactly nine digits, not all zero).
    pub fn parse(value: &str) -> ValidationResult<Self> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "document_number".to_string(),
            reason: reason.to_string(),
        };

        if value.len() != DOCUMENT_NUMBER_WIDTH || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("must be exactly nine digits"));
        }

        if value.bytes().all(|b| b == b'0') {
            return Err(invalid("sequence starts at 1"));
        }

        Ok(DocumentNumber(value.to_string()))
    }

    /// Reads the previous sequence value from the last issued number.
    ///
    /// Absent, non-numeric or non-positive values count as `0`.
    pub fn previous_sequence(previous: Option<&str>) -> u64 {
        previous
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n as u64)
            .unwrap_or(0)
    }

    /// Returns the number that follows `previous`.
    ///
    /// ## Example
    /// ```rust
    /// use ticketing_core::DocumentNumber;
    ///
    /// assert_eq!(DocumentNumber::next_after(None).unwrap().as_str(), "000000001");
    /// assert_eq!(DocumentNumber::next_after(Some("000000041")).unwrap().as_str(), "000000042");
    /// assert_eq!(DocumentNumber::next_after(Some("A-17")).unwrap().as_str(), "000000001");
    /// ```
    pub fn next_after(previous: Option<&str>) -> CoreResult<Self> {
        let previous = Self::previous_sequence(previous);
        let next = previous
            .checked_add(1)
            .ok_or(CoreError::SequenceExhausted { previous })?;
        Self::from_sequence(next)
    }

    /// Returns the numeric sequence value.
    pub fn sequence(&self) -> u64 {
        // Constructors guarantee nine ASCII digits
        self.0.parse().unwrap_or(0)
    }

    /// Returns the formatted number.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DocumentNumber::parse(&value)
    }
}

impl From<DocumentNumber> for String {
    fn from(number: DocumentNumber) -> Self {
        number.0
    }
}

// =============================================================================
// Company
// =============================================================================

/// The registered business that issues tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    /// Taxpayer registry number (unique).
    pub ruc: String,
    pub phone: String,
    /// Access key for the tax authority's electronic invoicing service.
    pub sri_access_key: String,
    /// Printed on every ticket.
    pub address: String,
    /// Current IVA rate; copied onto each new ticket.
    pub tax_percentage: TaxPercentage,
    /// Default customer printed on tickets, when set.
    pub client_name: Option<String>,
    pub client_ruc: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or replacing a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub ruc: String,
    pub phone: String,
    pub sri_access_key: String,
    pub address: String,
    #[serde(default)]
    pub tax_percentage: TaxPercentage,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_ruc: Option<String>,
}

impl NewCompany {
    /// Validates every field; stops at the first failure.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required_text("name", &self.name, MAX_TEXT_LENGTH)?;
        validate_ruc(&self.ruc)?;
        validate_required_text("phone", &self.phone, MAX_CODE_LENGTH)?;
        validate_required_text("sri_access_key", &self.sri_access_key, MAX_TEXT_LENGTH)?;
        if self.address.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "address".to_string(),
            });
        }
        validate_optional_text("client_name", self.client_name.as_deref(), MAX_TEXT_LENGTH)?;
        validate_optional_text("client_ruc", self.client_ruc.as_deref(), MAX_CODE_LENGTH)?;
        Ok(())
    }
}

// =============================================================================
// Ticket Header
// =============================================================================

/// The hand-entered fields of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketHeader {
    pub seller: String,
    pub client: String,
    /// Customer national ID or RUC.
    pub ci_ruc: String,
    pub phone: String,
    /// Vehicle plate.
    pub plate: String,
}

impl TicketHeader {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required_text("seller", &self.seller, MAX_TEXT_LENGTH)?;
        validate_required_text("client", &self.client, MAX_TEXT_LENGTH)?;
        validate_required_text("ci_ruc", &self.ci_ruc, MAX_CODE_LENGTH)?;
        validate_required_text("phone", &self.phone, MAX_CODE_LENGTH)?;
        validate_required_text("plate", &self.plate, MAX_CODE_LENGTH)?;
        Ok(())
    }

    /// Returns a copy with surrounding whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        TicketHeader {
            seller: self.seller.trim().to_string(),
            client: self.client.trim().to_string(),
            ci_ruc: self.ci_ruc.trim().to_string(),
            phone: self.phone.trim().to_string(),
            plate: self.plate.trim().to_string(),
        }
    }
}

// =============================================================================
// Ticket Detail
// =============================================================================

/// Input for one purchased line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicketDetail {
    pub product: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl NewTicketDetail {
    /// Validates the product label and computes the line total in one go.
    ///
    /// Quantity and unit price are checked by
    /// [`compute_line_total`](crate::calculator::compute_line_total).
    pub fn line_total(&self) -> CoreResult<Amount> {
        validate_required_text("product", &self.product, MAX_TEXT_LENGTH)?;
        compute_line_total(self.quantity, self.unit_price)
    }
}

/// A stored line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetail {
    pub id: i64,
    pub ticket_id: i64,
    pub product: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// `quantity × unit_price`, kept in sync on every change.
    pub total: Amount,
}

// =============================================================================
// Ticket
// =============================================================================

/// Input for creating a ticket together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Issuing company; `None` selects the default company.
    #[serde(default)]
    pub company_id: Option<i64>,
    pub header: TicketHeader,
    pub details: Vec<NewTicketDetail>,
}

impl NewTicket {
    /// Validates the header and every line item before anything is persisted.
    pub fn validate(&self) -> CoreResult<()> {
        self.header.validate()?;

        if self.details.is_empty() {
            return Err(CoreError::EmptyTicket);
        }

        for detail in &self.details {
            detail.line_total()?;
        }

        Ok(())
    }
}

/// A stored ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub company_id: i64,
    pub document_number: DocumentNumber,
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub header: TicketHeader,
    /// Company IVA rate at creation time.
    pub tax_percentage: TaxPercentage,
    /// Cached grand total; must match [`Ticket::recompute_totals`].
    pub total: Amount,
}

impl Ticket {
    /// Recomputes totals from the given details using this ticket's IVA snapshot.
    pub fn recompute_totals(&self, details: &[TicketDetail]) -> CoreResult<TicketTotals> {
        TicketTotals::compute(details.iter().map(|d| d.total), self.tax_percentage)
    }
}

/// A ticket that has not been persisted yet.
///
/// The document number is assigned exactly once, inside the transaction
/// that writes the ticket row.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketDraft {
    pub company_id: i64,
    pub document_number: Option<DocumentNumber>,
    pub date: DateTime<Utc>,
    pub header: TicketHeader,
    pub tax_percentage: TaxPercentage,
    pub lines: Vec<DraftLine>,
    pub totals: TicketTotals,
}

/// A validated line item with its computed total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Amount,
}

impl TicketDraft {
    /// Builds a draft for `company`, snapshotting its current IVA rate.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::Utc;
    /// use rust_decimal::Decimal;
    /// use ticketing_core::*;
    ///
    /// let company = Company {
    ///     id: 1,
    ///     name: "Lubricadora Norte".into(),
    ///     ruc: "0990000000001".into(),
    ///     phone: "042000000".into(),
    ///     sri_access_key: "key".into(),
    ///     address: "Av. Principal 100".into(),
    ///     tax_percentage: TaxPercentage::new(Decimal::new(15, 0)).unwrap(),
    ///     client_name: None,
    ///     client_ruc: None,
    ///     created_at: Utc::now(),
    /// };
    /// let new_ticket = NewTicket {
    ///     company_id: None,
    ///     header: TicketHeader {
    ///         seller: "Luis".into(),
    ///         client: "Ana".into(),
    ///         ci_ruc: "0912345678".into(),
    ///         phone: "0999999999".into(),
    ///         plate: "GBA-1234".into(),
    ///     },
    ///     details: vec![NewTicketDetail {
    ///         product: "Oil change".into(),
    ///         quantity: Decimal::ONE,
    ///         unit_price: Decimal::new(100, 0),
    ///     }],
    /// };
    ///
    /// let draft = TicketDraft::new(&company, &new_ticket, Utc::now()).unwrap();
    /// assert_eq!(draft.totals.total.to_string(), "115.00000000");
    /// assert!(draft.document_number.is_none());
    /// ```
    pub fn new(company: &Company, new_ticket: &NewTicket, date: DateTime<Utc>) -> CoreResult<Self> {
        new_ticket.header.validate()?;

        if new_ticket.details.is_empty() {
            return Err(CoreError::EmptyTicket);
        }

        let lines = new_ticket
            .details
            .iter()
            .map(|detail| {
                Ok(DraftLine {
                    product: detail.product.trim().to_string(),
                    quantity: detail.quantity,
                    unit_price: detail.unit_price,
                    total: detail.line_total()?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let tax_percentage = company.tax_percentage;
        let totals = TicketTotals::compute(lines.iter().map(|l| l.total), tax_percentage)?;

        Ok(TicketDraft {
            company_id: company.id,
            document_number: None,
            date,
            header: new_ticket.header.trimmed(),
            tax_percentage,
            lines,
            totals,
        })
    }

    /// Assigns the document number.
    ///
    /// ## Errors
    /// [`CoreError::AlreadyNumbered`] if a number is already present; the
    /// existing number is left untouched.
    pub fn assign_document_number(&mut self, number: DocumentNumber) -> CoreResult<()> {
        if let Some(existing) = &self.document_number {
            return Err(CoreError::AlreadyNumbered {
                document_number: existing.to_string(),
            });
        }

        self.document_number = Some(number);
        Ok(())
    }
}

/// A ticket with its line items and freshly computed totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketWithDetails {
    pub ticket: Ticket,
    pub details: Vec<TicketDetail>,
    pub totals: TicketTotals,
}

impl TicketWithDetails {
    pub fn new(ticket: Ticket, details: Vec<TicketDetail>) -> CoreResult<Self> {
        let totals = ticket.recompute_totals(&details)?;
        Ok(TicketWithDetails {
            ticket,
            details,
            totals,
        })
    }

    /// Whether the cached `ticket.total` matches the recomputed total.
    pub fn is_consistent(&self) -> bool {
        self.ticket.total == self.totals.total
    }
}

// =============================================================================
// Listings
// =============================================================================

/// Filter for ticket listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketFilter {
    pub company_id: Option<i64>,
    /// Case-insensitive match against client, seller or CI/RUC.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for TicketFilter {
    fn default() -> Self {
        TicketFilter {
            company_id: None,
            search: None,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.per_page))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Row offset of a 1-based page.
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

/// Dashboard figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub total_tickets: u64,
    pub total_companies: u64,
    /// Newest first.
    pub recent_tickets: Vec<Ticket>,
}

// =============================================================================
// Unit Tests
// =============================================================================
