//! # Ticket Repository
//!
//! Database operations for sales tickets and their line items.
//!
//! ## Ticket Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ticket Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (one transaction, under the write lock)                     │
//! │     └── create() → resolve company → snapshot IVA rate                 │
//! │                  → allocate document number → insert ticket + details  │
//! │                  → store computed total → COMMIT                       │
//! │                                                                         │
//! │  2. EDIT                                                               │
//! │     └── update_header() → seller / client / ci_ruc / phone / plate     │
//! │     └── add_detail() / update_detail() / remove_detail()               │
//! │           └── each one re-stores ticket.total in the same transaction  │
//! │                                                                         │
//! │  3. PRINT                                                              │
//! │     └── get_with_details() / get_many_with_details()                   │
//! │                                                                         │
//! │  Never changes after creation: company, IVA snapshot, document number  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::company::{fetch_company, fetch_default_company};
use super::sequence::DocumentSequencer;
use super::{
    decimal_text, like_pattern, parse_amount, parse_decimal, parse_tax_percentage, search_key,
    WriteTransaction,
};
use crate::error::{DbError, DbResult};
use ticketing_core::validation::{validate_page, validate_search_query};
use ticketing_core::{
    page_offset, CoreError, DocumentNumber, NewTicket, NewTicketDetail, Page, Ticket, TicketDetail,
    TicketDraft, TicketFilter, TicketHeader, TicketSummary, TicketWithDetails,
};

/// Base delay between ticket creation attempts; doubles per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

const TICKET_COLUMNS: &str = r#"
    id, company_id, document_number, date,
    seller, client, ci_ruc, phone, plate,
    tax_percentage, total
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: i64,
    company_id: i64,
    document_number: String,
    date: DateTime<Utc>,
    seller: String,
    client: String,
    ci_ruc: String,
    phone: String,
    plate: String,
    tax_percentage: String,
    total: String,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = DbError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let document_number = DocumentNumber::parse(&row.document_number)
            .map_err(|e| DbError::corrupt("tickets.document_number", &row.document_number, e))?;

        Ok(Ticket {
            id: row.id,
            company_id: row.company_id,
            document_number,
            date: row.date,
            header: TicketHeader {
                seller: row.seller,
                client: row.client,
                ci_ruc: row.ci_ruc,
                phone: row.phone,
                plate: row.plate,
            },
            tax_percentage: parse_tax_percentage("tickets.tax_percentage", &row.tax_percentage)?,
            total: parse_amount("tickets.total", &row.total)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    id: i64,
    ticket_id: i64,
    product: String,
    quantity: String,
    unit_price: String,
    total: String,
}

impl TryFrom<DetailRow> for TicketDetail {
    type Error = DbError;

    fn try_from(row: DetailRow) -> Result<Self, Self::Error> {
        Ok(TicketDetail {
            quantity: parse_decimal("ticket_details.quantity", &row.quantity)?,
            unit_price: parse_decimal("ticket_details.unit_price", &row.unit_price)?,
            total: parse_amount("ticket_details.total", &row.total)?,
            id: row.id,
            ticket_id: row.ticket_id,
            product: row.product,
        })
    }
}

fn to_tickets(rows: Vec<TicketRow>) -> DbResult<Vec<Ticket>> {
    rows.into_iter().map(Ticket::try_from).collect()
}

// =============================================================================
// Connection-Level Queries
// =============================================================================

async fn fetch_ticket(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1");
    let row: Option<TicketRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Ticket::try_from).transpose()
}

async fn fetch_details(conn: &mut SqliteConnection, ticket_id: i64) -> DbResult<Vec<TicketDetail>> {
    let rows: Vec<DetailRow> = sqlx::query_as(
        r#"
        SELECT id, ticket_id, product, quantity, unit_price, total
        FROM ticket_details
        WHERE ticket_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(ticket_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(TicketDetail::try_from).collect()
}

async fn fetch_with_details(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<TicketWithDetails>> {
    let Some(ticket) = fetch_ticket(&mut *conn, id).await? else {
        return Ok(None);
    };
    let details = fetch_details(conn, id).await?;
    Ok(Some(TicketWithDetails::new(ticket, details)?))
}

/// Ticket a detail belongs to.
async fn detail_ticket_id(conn: &mut SqliteConnection, detail_id: i64) -> DbResult<i64> {
    let ticket_id: Option<i64> = sqlx::query_scalar("SELECT ticket_id FROM ticket_details WHERE id = ?1")
        .bind(detail_id)
        .fetch_optional(conn)
        .await?;

    ticket_id.ok_or_else(|| DbError::not_found("TicketDetail", detail_id))
}

/// Recomputes a ticket's totals from its stored details and IVA snapshot,
/// and writes `tickets.total` when it drifted.
async fn store_total(conn: &mut SqliteConnection, ticket_id: i64) -> DbResult<TicketWithDetails> {
    let mut with_details = fetch_with_details(&mut *conn, ticket_id)
        .await?
        .ok_or_else(|| DbError::not_found("Ticket", ticket_id))?;

    if !with_details.is_consistent() {
        sqlx::query("UPDATE tickets SET total = ?1 WHERE id = ?2")
            .bind(with_details.totals.total.to_string())
            .bind(ticket_id)
            .execute(conn)
            .await?;

        debug!(
            ticket_id,
            old_total = %with_details.ticket.total,
            new_total = %with_details.totals.total,
            "Ticket total updated"
        );
        with_details.ticket.total = with_details.totals.total;
    }

    Ok(with_details)
}

fn ticket_search_key(header: &TicketHeader) -> String {
    search_key(&[header.client.as_str(), header.seller.as_str(), header.ci_ruc.as_str()])
}

async fn insert_detail(
    conn: &mut SqliteConnection,
    ticket_id: i64,
    product: &str,
    quantity: Decimal,
    unit_price: Decimal,
    total: &str,
) -> DbResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO ticket_details (ticket_id, product, quantity, unit_price, total)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(ticket_id)
    .bind(product)
    .bind(decimal_text("quantity", quantity)?)
    .bind(decimal_text("unit price", unit_price)?)
    .bind(total)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ticket database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.tickets();
///
/// let created = repo.create(&new_ticket).await?;
/// println!("{}", created.ticket.document_number); // "000000042"
///
/// let page = repo.list(&TicketFilter::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
    sequence_retries: u32,
}

impl TicketRepository {
    /// Creates a new TicketRepository.
    ///
    /// `sequence_retries` is the number of creation attempts made when the
    /// write lock cannot be taken in time.
    pub fn new(pool: SqlitePool, sequence_retries: u32) -> Self {
        TicketRepository {
            pool,
            sequence_retries: sequence_retries.max(1),
        }
    }

    /// Creates a ticket with its line items and assigns its document number.
    ///
    /// ## How It Works
    /// 1. Validates the header and every line (no database access)
    /// 2. Opens a [`WriteTransaction`]; concurrent creators wait here
    /// 3. Loads the company and copies its IVA rate onto the ticket
    /// 4. Allocates the next document number
    /// 5. Inserts the ticket, its details and the computed total, then commits
    ///
    /// When the lock wait times out the transaction is rolled back and the
    /// whole creation starts over, up to `sequence_retries` attempts.
    ///
    /// ## Errors
    /// - Validation / [`CoreError::EmptyTicket`] before anything is written
    /// - [`DbError::NotFound`] for an unknown company (or no company at all)
    /// - [`DbError::SequencingConflict`] after the last failed attempt
    pub async fn create(&self, new_ticket: &NewTicket) -> DbResult<TicketWithDetails> {
        new_ticket.validate()?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.try_create(new_ticket).await {
                Ok(created) => {
                    info!(
                        id = created.ticket.id,
                        document_number = %created.ticket.document_number,
                        total = %created.ticket.total,
                        attempt,
                        "Ticket created"
                    );
                    return Ok(created);
                }
                Err(err @ (DbError::Busy(_) | DbError::PoolExhausted)) => {
                    if attempt >= self.sequence_retries {
                        warn!(attempt, error = %err, "Giving up on ticket creation");
                        return Err(DbError::SequencingConflict { attempts: attempt });
                    }

                    let backoff = RETRY_BACKOFF * 2u32.pow(attempt.min(6));
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Ticket write lock busy, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_create(&self, new_ticket: &NewTicket) -> DbResult<TicketWithDetails> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let company = match new_ticket.company_id {
            Some(id) => fetch_company(tx.conn(), id)
                .await?
                .ok_or_else(|| DbError::not_found("Company", id))?,
            None => fetch_default_company(tx.conn())
                .await?
                .ok_or_else(|| DbError::not_found("Company", "default"))?,
        };

        let mut draft = TicketDraft::new(&company, new_ticket, Utc::now())?;
        let document_number = DocumentSequencer::number_draft(&mut tx, &mut draft).await?;

        let ticket_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tickets (
                company_id, document_number, date,
                seller, client, ci_ruc, phone, plate,
                tax_percentage, total, search_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING id
            "#,
        )
        .bind(draft.company_id)
        .bind(document_number.as_str())
        .bind(draft.date)
        .bind(&draft.header.seller)
        .bind(&draft.header.client)
        .bind(&draft.header.ci_ruc)
        .bind(&draft.header.phone)
        .bind(&draft.header.plate)
        .bind(draft.tax_percentage.to_string())
        .bind(draft.totals.total.to_string())
        .bind(ticket_search_key(&draft.header))
        .fetch_one(tx.conn())
        .await?;

        for line in &draft.lines {
            insert_detail(
                tx.conn(),
                ticket_id,
                &line.product,
                line.quantity,
                line.unit_price,
                &line.total.to_string(),
            )
            .await?;
        }

        let created = fetch_with_details(tx.conn(), ticket_id)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", ticket_id))?;

        tx.commit().await?;
        Ok(created)
    }

    /// Gets a ticket by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Ticket>> {
        let mut conn = self.pool.acquire().await?;
        fetch_ticket(&mut conn, id).await
    }

    /// Gets a ticket by its document number (exactly nine digits).
    pub async fn get_by_document_number(&self, document_number: &str) -> DbResult<Option<Ticket>> {
        let document_number = DocumentNumber::parse(document_number.trim())?;

        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE document_number = ?1");
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(document_number.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Ticket::try_from).transpose()
    }

    /// Gets the line items of a ticket, in insertion order.
    pub async fn get_details(&self, ticket_id: i64) -> DbResult<Vec<TicketDetail>> {
        let mut conn = self.pool.acquire().await?;
        fetch_details(&mut conn, ticket_id).await
    }

    /// Gets a ticket with its details and recomputed totals.
    pub async fn get_with_details(&self, id: i64) -> DbResult<Option<TicketWithDetails>> {
        let mut conn = self.pool.acquire().await?;
        fetch_with_details(&mut conn, id).await
    }

    /// Loads several tickets for bulk printing, in the order requested.
    ///
    /// ## Errors
    /// [`DbError::NotFound`] naming the first ID that does not exist.
    pub async fn get_many_with_details(&self, ids: &[i64]) -> DbResult<Vec<TicketWithDetails>> {
        let mut conn = self.pool.acquire().await?;
        let mut tickets = Vec::with_capacity(ids.len());

        for &id in ids {
            let ticket = fetch_with_details(&mut conn, id)
                .await?
                .ok_or_else(|| DbError::not_found("Ticket", id))?;
            tickets.push(ticket);
        }

        Ok(tickets)
    }

    /// Lists tickets newest first.
    ///
    /// ## Filtering
    /// - `company_id`: only that company's tickets
    /// - `search`: case-insensitive substring of client, seller or CI/RUC.
    ///   Folding is Unicode lowercase, so `ángel` finds `Ángel`; accents
    ///   still have to match (`angel` does not).
    pub async fn list(&self, filter: &TicketFilter) -> DbResult<Page<Ticket>> {
        validate_page(filter.page, filter.per_page)?;
        let pattern = match filter.search.as_deref() {
            Some(query) => validate_search_query(query)?.map(|q| like_pattern(&q)),
            None => None,
        };

        debug!(
            company_id = ?filter.company_id,
            search = ?pattern,
            page = filter.page,
            "Listing tickets"
        );

        let total_items: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tickets
            WHERE (?1 IS NULL OR company_id = ?1)
              AND (?2 IS NULL OR search_key LIKE ?2 ESCAPE '\')
            "#,
        )
        .bind(filter.company_id)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
            SELECT {TICKET_COLUMNS} FROM tickets
            WHERE (?1 IS NULL OR company_id = ?1)
              AND (?2 IS NULL OR search_key LIKE ?2 ESCAPE '\')
            ORDER BY date DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&sql)
            .bind(filter.company_id)
            .bind(pattern.as_deref())
            .bind(i64::from(filter.per_page))
            .bind(page_offset(filter.page, filter.per_page))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: to_tickets(rows)?,
            page: filter.page,
            per_page: filter.per_page,
            total_items: total_items.max(0) as u64,
        })
    }

    /// Replaces the hand-entered header fields.
    ///
    /// Company, IVA snapshot and document number are not touched.
    pub async fn update_header(&self, id: i64, header: &TicketHeader) -> DbResult<Ticket> {
        header.validate()?;
        let header = header.trimmed();

        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE tickets SET
                seller = ?1, client = ?2, ci_ruc = ?3, phone = ?4, plate = ?5,
                search_key = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&header.seller)
        .bind(&header.client)
        .bind(&header.ci_ruc)
        .bind(&header.phone)
        .bind(&header.plate)
        .bind(ticket_search_key(&header))
        .bind(id)
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ticket", id));
        }

        let ticket = fetch_ticket(tx.conn(), id)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", id))?;

        tx.commit().await?;
        debug!(id, "Ticket header updated");
        Ok(ticket)
    }

    /// Adds a line item and re-stores the ticket total.
    pub async fn add_detail(&self, ticket_id: i64, detail: &NewTicketDetail) -> DbResult<TicketWithDetails> {
        let line_total = detail.line_total()?;

        let mut tx = WriteTransaction::begin(&self.pool).await?;

        if fetch_ticket(tx.conn(), ticket_id).await?.is_none() {
            return Err(DbError::not_found("Ticket", ticket_id));
        }

        let detail_id = insert_detail(
            tx.conn(),
            ticket_id,
            detail.product.trim(),
            detail.quantity,
            detail.unit_price,
            &line_total.to_string(),
        )
        .await?;

        let updated = store_total(tx.conn(), ticket_id).await?;
        tx.commit().await?;

        debug!(ticket_id, detail_id, "Detail added");
        Ok(updated)
    }

    /// Replaces a line item and re-stores the ticket total.
    pub async fn update_detail(&self, detail_id: i64, detail: &NewTicketDetail) -> DbResult<TicketWithDetails> {
        let line_total = detail.line_total()?;

        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let ticket_id = detail_ticket_id(tx.conn(), detail_id).await?;

        sqlx::query(
            r#"
            UPDATE ticket_details SET
                product = ?1, quantity = ?2, unit_price = ?3, total = ?4
            WHERE id = ?5
            "#,
        )
        .bind(detail.product.trim())
        .bind(decimal_text("quantity", detail.quantity)?)
        .bind(decimal_text("unit price", detail.unit_price)?)
        .bind(line_total.to_string())
        .bind(detail_id)
        .execute(tx.conn())
        .await?;

        let updated = store_total(tx.conn(), ticket_id).await?;
        tx.commit().await?;

        debug!(ticket_id, detail_id, "Detail updated");
        Ok(updated)
    }

    /// Removes a line item and re-stores the ticket total.
    ///
    /// ## Errors
    /// [`CoreError::EmptyTicket`] when it is the ticket's only line item.
    pub async fn remove_detail(&self, detail_id: i64) -> DbResult<TicketWithDetails> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let ticket_id = detail_ticket_id(tx.conn(), detail_id).await?;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket_details WHERE ticket_id = ?1")
            .bind(ticket_id)
            .fetch_one(tx.conn())
            .await?;

        if remaining <= 1 {
            return Err(CoreError::EmptyTicket.into());
        }

        sqlx::query("DELETE FROM ticket_details WHERE id = ?1")
            .bind(detail_id)
            .execute(tx.conn())
            .await?;

        let updated = store_total(tx.conn(), ticket_id).await?;
        tx.commit().await?;

        debug!(ticket_id, detail_id, "Detail removed");
        Ok(updated)
    }

    /// Recomputes the total from stored details and the ticket's own IVA
    /// snapshot, storing it if it drifted.
    pub async fn recalculate_total(&self, id: i64) -> DbResult<TicketWithDetails> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let updated = store_total(tx.conn(), id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a ticket and its details.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let result = sqlx::query("DELETE FROM tickets WHERE id = ?1")
            .bind(id)
            .execute(tx.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ticket", id));
        }

        tx.commit().await?;
        info!(id, "Ticket deleted");
        Ok(())
    }

    /// Dashboard figures: ticket and company counts plus the newest tickets.
    pub async fn summary(&self, recent: u32) -> DbResult<TicketSummary> {
        let total_tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;
        let total_companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets ORDER BY date DESC, id DESC LIMIT ?1");
        let rows: Vec<TicketRow> = sqlx::query_as(&sql)
            .bind(i64::from(recent))
            .fetch_all(&self.pool)
            .await?;

        Ok(TicketSummary {
            total_tickets: total_tickets.max(0) as u64,
            total_companies: total_companies.max(0) as u64,
            recent_tickets: to_tickets(rows)?,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use ticketing_core::{TaxPercentage, ValidationError};

    async fn setup() -> (crate::Database, ticketing_core::Company) {
        let db = memory_db().await;
        let company = db
            .companies()
            .create(&new_company("0990000000001", dec!(12)))
            .await
            .unwrap();
        (db, company)
    }

    #[tokio::test]
    async fn test_create_ticket() {
        let (db, company) = setup().await;

        let created = db
            .tickets()
            .create(&new_ticket(
                company.id,
                vec![
                    detail("Filtro de aceite", dec!(2), dec!(5)),
                    detail("Aceite 20W50", dec!(1), dec!(5.5)),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(created.ticket.document_number.as_str(), "000000001");
        assert_eq!(created.ticket.tax_percentage.to_string(), "12.00");
        assert_eq!(created.totals.subtotal.to_string(), "15.50000000");
        assert_eq!(created.totals.tax_amount.to_string(), "1.86000000");
        assert_eq!(created.ticket.total.to_string(), "17.36000000");
        assert_eq!(created.details.len(), 2);
        assert_eq!(created.details[0].total.to_string(), "10.00000000");
        assert!(created.is_consistent());

        let second = db
            .tickets()
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(1))]))
            .await
            .unwrap();
        assert_eq!(second.ticket.document_number.as_str(), "000000002");
    }

    #[tokio::test]
    async fn test_create_uses_default_company() {
        let (db, company) = setup().await;
        let mut input = new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(1))]);
        input.company_id = None;

        let created = db.tickets().create(&input).await.unwrap();
        assert_eq!(created.ticket.company_id, company.id);
    }

    #[tokio::test]
    async fn test_create_without_company_fails() {
        let db = memory_db().await;
        let mut input = new_ticket(1, vec![detail("Filtro", dec!(1), dec!(1))]);
        input.company_id = None;

        let err = db.tickets().create(&input).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_ticket_consumes_no_number() {
        let (db, company) = setup().await;
        let repo = db.tickets();

        let err = repo.create(&new_ticket(company.id, vec![])).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyTicket)));

        let err = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(-1), dec!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::MustBePositive { .. })));

        let err = repo
            .create(&new_ticket(999, vec![detail("Filtro", dec!(1), dec!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let created = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(1))]))
            .await
            .unwrap();
        assert_eq!(created.ticket.document_number.as_str(), "000000001");
    }

    #[tokio::test]
    async fn test_tax_snapshot_survives_company_change() {
        let (db, company) = setup().await;
        let created = db
            .tickets()
            .create(&new_ticket(company.id, vec![detail("Servicio", dec!(1), dec!(100))]))
            .await
            .unwrap();
        assert_eq!(created.ticket.total.to_string(), "112.00000000");

        db.companies()
            .update_tax_percentage(company.id, TaxPercentage::new(dec!(15)).unwrap())
            .await
            .unwrap();

        let recalculated = db.tickets().recalculate_total(created.ticket.id).await.unwrap();
        assert_eq!(recalculated.ticket.tax_percentage.to_string(), "12.00");
        assert_eq!(recalculated.ticket.total.to_string(), "112.00000000");

        let newer = db
            .tickets()
            .create(&new_ticket(company.id, vec![detail("Servicio", dec!(1), dec!(100))]))
            .await
            .unwrap();
        assert_eq!(newer.ticket.total.to_string(), "115.00000000");
    }

    #[tokio::test]
    async fn test_detail_mutations_keep_total_in_sync() {
        let (db, company) = setup().await;
        let repo = db.tickets();
        let created = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(2), dec!(5))]))
            .await
            .unwrap();
        let id = created.ticket.id;

        let added = repo
            .add_detail(id, &detail("Aceite", dec!(0.5), dec!(11)))
            .await
            .unwrap();
        assert_eq!(added.details.len(), 2);
        assert_eq!(added.ticket.total.to_string(), "17.36000000");
        assert!(added.is_consistent());

        let oil_id = added.details[1].id;
        let updated = repo
            .update_detail(oil_id, &detail("Aceite", dec!(1), dec!(11)))
            .await
            .unwrap();
        assert_eq!(updated.totals.subtotal.to_string(), "21.00000000");
        assert_eq!(updated.ticket.total.to_string(), "23.52000000");

        let removed = repo.remove_detail(oil_id).await.unwrap();
        assert_eq!(removed.details.len(), 1);
        assert_eq!(removed.ticket.total.to_string(), "11.20000000");

        let stored = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.total, removed.ticket.total);
    }

    #[tokio::test]
    async fn test_last_detail_cannot_be_removed() {
        let (db, company) = setup().await;
        let repo = db.tickets();
        let created = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        let err = repo.remove_detail(created.details[0].id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyTicket)));
        assert_eq!(repo.get_details(created.ticket.id).await.unwrap().len(), 1);

        assert!(matches!(
            repo.remove_detail(9_999).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_header_keeps_number() {
        let (db, company) = setup().await;
        let repo = db.tickets();
        let created = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        let mut header = header(" Pedro Mora ");
        header.plate = "PBC-0001".to_string();
        let updated = repo.update_header(created.ticket.id, &header).await.unwrap();

        assert_eq!(updated.header.client, "Pedro Mora");
        assert_eq!(updated.header.plate, "PBC-0001");
        assert_eq!(updated.document_number, created.ticket.document_number);
        assert_eq!(updated.total, created.ticket.total);
    }

    #[tokio::test]
    async fn test_document_number_is_immutable() {
        let (db, company) = setup().await;
        let created = db
            .tickets()
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        let err: DbError = sqlx::query("UPDATE tickets SET document_number = '000000099' WHERE id = ?1")
            .bind(created.ticket.id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::ImmutableField(_)));

        // Same value is not a change
        sqlx::query("UPDATE tickets SET document_number = document_number WHERE id = ?1")
            .bind(created.ticket.id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_by_document_number() {
        let (db, company) = setup().await;
        let repo = db.tickets();
        let created = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        let found = repo.get_by_document_number("000000001").await.unwrap().unwrap();
        assert_eq!(found.id, created.ticket.id);
        assert!(repo.get_by_document_number("000000002").await.unwrap().is_none());
        assert!(repo.get_by_document_number("1").await.is_err());
    }

    #[tokio::test]
    async fn test_list_search_and_paging() {
        let (db, company) = setup().await;
        let repo = db.tickets();

        for client in ["Ana Torres", "Bruno Vera", "Ana Lucia Paz"] {
            let mut input = new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]);
            input.header.client = client.to_string();
            repo.create(&input).await.unwrap();
        }

        let page = repo.list(&TicketFilter::default()).await.unwrap();
        assert_eq!(page.total_items, 3);
        assert_eq!(page.items[0].header.client, "Ana Lucia Paz");
        assert_eq!(page.items[2].header.client, "Ana Torres");

        let found = repo
            .list(&TicketFilter {
                search: Some("ana".to_string()),
                ..TicketFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(found.total_items, 2);

        let second_page = repo
            .list(&TicketFilter {
                page: 2,
                per_page: 2,
                ..TicketFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(second_page.items.len(), 1);
        assert!(!second_page.has_next());

        let other = repo
            .list(&TicketFilter {
                company_id: Some(company.id + 1),
                ..TicketFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(other.total_items, 0);

        assert!(repo
            .list(&TicketFilter {
                page: 0,
                ..TicketFilter::default()
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_search_folds_accented_letters() {
        let (db, company) = setup().await;
        let repo = db.tickets();

        let mut input = new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]);
        input.header.client = "Ángel Núñez".to_string();
        let created = repo.create(&input).await.unwrap();

        let search = |query: &str| TicketFilter {
            search: Some(query.to_string()),
            ..TicketFilter::default()
        };
        assert_eq!(repo.list(&search("ángel")).await.unwrap().total_items, 1);
        assert_eq!(repo.list(&search("NÚÑEZ")).await.unwrap().total_items, 1);
        assert_eq!(repo.list(&search("angel")).await.unwrap().total_items, 0);

        let mut header = input.header.clone();
        header.client = "Óscar Ibarra".to_string();
        repo.update_header(created.ticket.id, &header).await.unwrap();
        assert_eq!(repo.list(&search("ángel")).await.unwrap().total_items, 0);
        assert_eq!(repo.list(&search("óscar")).await.unwrap().total_items, 1);
    }

    #[tokio::test]
    async fn test_bulk_print_and_summary() {
        let (db, company) = setup().await;
        let repo = db.tickets();
        let a = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();
        let b = repo
            .create(&new_ticket(company.id, vec![detail("Aceite", dec!(2), dec!(7))]))
            .await
            .unwrap();

        let printed = repo.get_many_with_details(&[b.ticket.id, a.ticket.id]).await.unwrap();
        assert_eq!(printed[0].ticket.id, b.ticket.id);
        assert_eq!(printed[1].details[0].product, "Filtro");

        assert!(matches!(
            repo.get_many_with_details(&[a.ticket.id, 404]).await,
            Err(DbError::NotFound { .. })
        ));

        let summary = repo.summary(1).await.unwrap();
        assert_eq!(summary.total_tickets, 2);
        assert_eq!(summary.total_companies, 1);
        assert_eq!(summary.recent_tickets.len(), 1);
        assert_eq!(summary.recent_tickets[0].id, b.ticket.id);
    }

    #[tokio::test]
    async fn test_delete_ticket() {
        let (db, company) = setup().await;
        let repo = db.tickets();
        let created = repo
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        repo.delete(created.ticket.id).await.unwrap();
        assert!(repo.get_with_details(created.ticket.id).await.unwrap().is_none());
        assert!(repo.get_details(created.ticket.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete(created.ticket.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_yields_contiguous_numbers() {
        const WRITERS: u64 = 24;

        let (db, path) = file_db(6).await;
        let company = db
            .companies()
            .create(&new_company("0990000000001", dec!(12)))
            .await
            .unwrap();

        let repo = db.tickets();
        repo.create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..WRITERS {
            let repo = repo.clone();
            let input = new_ticket(company.id, vec![detail("Filtro", Decimal::from(i + 1), dec!(5))]);
            handles.push(tokio::spawn(async move { repo.create(&input).await }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            let created = handle.await.unwrap().unwrap();
            assert!(numbers.insert(created.ticket.document_number.sequence()));
        }

        let expected: HashSet<u64> = (2..=WRITERS + 1).collect();
        assert_eq!(numbers, expected);

        db.close().await;
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_held_write_lock_exhausts_retries() {
        let path = std::env::temp_dir().join(format!("ticketing-{}.db", uuid::Uuid::new_v4()));
        let db = crate::Database::new(
            crate::DbConfig::new(&path)
                .max_connections(3)
                .busy_timeout(Duration::from_millis(50))
                .sequence_retries(2),
        )
        .await
        .unwrap();
        let company = db
            .companies()
            .create(&new_company("0990000000001", dec!(12)))
            .await
            .unwrap();
        let repo = db.tickets();
        let input = new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]);
        repo.create(&input).await.unwrap();

        let holder = WriteTransaction::begin(db.pool()).await.unwrap();

        let err = repo.create(&input).await.unwrap_err();
        assert!(matches!(err, DbError::SequencingConflict { attempts: 2 }));
        assert!(err.is_transient());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        drop(holder);

        let next = repo.create(&input).await.unwrap();
        assert_eq!(next.ticket.document_number.as_str(), "000000002");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);

        db.close().await;
        cleanup(&path);
    }
}
