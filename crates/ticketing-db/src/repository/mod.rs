//! # Repository Module
//!
//! Database repository implementations for the ticket ledger.
//!
//! ## Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who May Write Tickets                                │
//! │                                                                         │
//! │  TicketRepository::create / add_detail / update_detail / ...           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WriteTransaction::begin(pool)                                         │
//! │  ├── BEGIN (deferred)                                                  │
//! │  └── UPDATE ticket_write_lock ... ← first statement: takes the SQLite  │
//! │       │                             write lock, waits up to            │
//! │       │                             busy_timeout for other writers     │
//! │       ▼                                                                 │
//! │  DocumentSequencer::allocate_next(&mut tx)                             │
//! │  INSERT tickets / ticket_details                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tx.commit() ← lock released; dropping tx instead rolls everything back│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CompanyRepository`](company::CompanyRepository) - Company CRUD and IVA rate
//! - [`TicketRepository`](ticket::TicketRepository) - Tickets, details and listings
//! - [`DocumentSequencer`](sequence::DocumentSequencer) - Document number allocation

pub mod company;
pub mod sequence;
pub mod ticket;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::trace;

use crate::error::{DbError, DbResult};
use ticketing_core::{Amount, CoreError, TaxPercentage, AMOUNT_SCALE};

// =============================================================================
// Write Transaction
// =============================================================================

/// A transaction that holds the ticket write lock from its first statement.
///
/// Dropping it without calling [`commit`](WriteTransaction::commit) rolls
/// back every statement, so a document number chosen inside it is never
/// consumed.
#[derive(Debug)]
pub struct WriteTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl WriteTransaction {
    /// Opens a transaction and takes the write lock.
    ///
    /// ## Errors
    /// [`DbError::Busy`] when another writer keeps the lock past the busy timeout.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query("UPDATE ticket_write_lock SET acquired_at = ?1 WHERE id = 1")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(DbError::Internal(
                "ticket_write_lock row is missing".to_string(),
            ));
        }

        trace!("Ticket write lock acquired");
        Ok(WriteTransaction { tx })
    }

    /// The connection the transaction runs on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commits and releases the lock.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Column Helpers
// =============================================================================

/// Canonical column text for quantities and prices: fixed 8 fraction digits.
///
/// ## Errors
/// [`CoreError::ArithmeticOverflow`] when the integer part leaves no room
/// for 8 fraction digits.
pub(crate) fn decimal_text(column: &'static str, value: Decimal) -> DbResult<String> {
    let mut value = value;
    value.rescale(AMOUNT_SCALE);
    if value.scale() != AMOUNT_SCALE {
        return Err(CoreError::overflow(column).into());
    }
    Ok(value.to_string())
}

/// Decimals live in TEXT columns; a value that does not parse is corruption.
pub(crate) fn parse_decimal(column: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| DbError::corrupt(column, raw, e))
}

pub(crate) fn parse_amount(column: &str, raw: &str) -> DbResult<Amount> {
    parse_decimal(column, raw).map(Amount::new)
}

pub(crate) fn parse_tax_percentage(column: &str, raw: &str) -> DbResult<TaxPercentage> {
    let value = parse_decimal(column, raw)?;
    TaxPercentage::new(value).map_err(|e| DbError::corrupt(column, raw, e))
}

/// Folded text stored in `search_key` columns: the fields lowercased and
/// joined by newlines.
pub(crate) fn search_key(fields: &[&str]) -> String {
    fields.join("\n").to_lowercase()
}

/// Builds a `LIKE` pattern matching `query` anywhere, with `\` as escape.
///
/// The query is lowercased the same way as [`search_key`], which makes the
/// match case-insensitive for every script rather than ASCII only.
pub(crate) fn like_pattern(query: &str) -> String {
    let query = query.to_lowercase();
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the repository tests.

    use rust_decimal::Decimal;
    use std::path::PathBuf;
    use ticketing_core::{NewCompany, NewTicket, NewTicketDetail, TaxPercentage, TicketHeader};

    use crate::pool::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// A fresh database file under the temp dir, for multi-connection tests.
    pub async fn file_db(max_connections: u32) -> (Database, PathBuf) {
        let path = std::env::temp_dir().join(format!("ticketing-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(max_connections)
                .sequence_retries(10),
        )
        .await
        .unwrap();
        (db, path)
    }

    pub fn cleanup(path: &PathBuf) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    pub fn new_company(ruc: &str, tax: Decimal) -> NewCompany {
        NewCompany {
            name: "Lubricadora Norte".to_string(),
            ruc: ruc.to_string(),
            phone: "042000000".to_string(),
            sri_access_key: "2110202301099000000000120010010000000011234567813".to_string(),
            address: "Av. Principal 100".to_string(),
            tax_percentage: TaxPercentage::new(tax).unwrap(),
            client_name: None,
            client_ruc: None,
        }
    }

    pub fn header(client: &str) -> TicketHeader {
        TicketHeader {
            seller: "Luis".to_string(),
            client: client.to_string(),
            ci_ruc: "0912345678".to_string(),
            phone: "0999999999".to_string(),
            plate: "GBA-1234".to_string(),
        }
    }

    pub fn detail(product: &str, quantity: Decimal, unit_price: Decimal) -> NewTicketDetail {
        NewTicketDetail {
            product: product.to_string(),
            quantity,
            unit_price,
        }
    }

    pub fn new_ticket(company_id: i64, details: Vec<NewTicketDetail>) -> NewTicket {
        NewTicket {
            company_id: Some(company_id),
            header: header("Ana Torres"),
            details,
        }
    }
}
