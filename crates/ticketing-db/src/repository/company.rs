//! # Company Repository
//!
//! Database operations for issuing companies.
//!
//! ## Default Company
//! Tickets created without an explicit company go to the default company:
//! the oldest registered one (lowest id). Most installations have exactly one.
//!
//! ## IVA Rate
//! `tax_percentage` is the rate for tickets created from now on. Existing
//! tickets keep the rate they were created with.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{like_pattern, parse_tax_percentage, search_key, WriteTransaction};
use crate::error::{DbError, DbResult};
use ticketing_core::validation::{validate_page, validate_search_query};
use ticketing_core::{page_offset, Company, NewCompany, Page, TaxPercentage};

const COMPANY_COLUMNS: &str = r#"
    id, name, ruc, phone, sri_access_key, address,
    tax_percentage, client_name, client_ruc, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: i64,
    name: String,
    ruc: String,
    phone: String,
    sri_access_key: String,
    address: String,
    tax_percentage: String,
    client_name: Option<String>,
    client_ruc: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CompanyRow> for Company {
    type Error = DbError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        Ok(Company {
            tax_percentage: parse_tax_percentage("companies.tax_percentage", &row.tax_percentage)?,
            id: row.id,
            name: row.name,
            ruc: row.ruc,
            phone: row.phone,
            sri_access_key: row.sri_access_key,
            address: row.address,
            client_name: row.client_name,
            client_ruc: row.client_ruc,
            created_at: row.created_at,
        })
    }
}

/// Loads a company on an existing connection (used inside ticket transactions).
pub(crate) async fn fetch_company(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Company>> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1");
    let row: Option<CompanyRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Company::try_from).transpose()
}

pub(crate) async fn fetch_default_company(conn: &mut SqliteConnection) -> DbResult<Option<Company>> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY id ASC LIMIT 1");
    let row: Option<CompanyRow> = sqlx::query_as(&sql).fetch_optional(conn).await?;
    row.map(Company::try_from).transpose()
}

fn trimmed_optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Repository for company database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.companies();
///
/// let company = repo.create(&new_company).await?;
/// repo.update_tax_percentage(company.id, TaxPercentage::new(dec!(15))?).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    /// Registers a company.
    ///
    /// ## Errors
    /// - Validation errors for missing or oversized fields
    /// - [`DbError::UniqueViolation`] when the RUC is already registered
    pub async fn create(&self, input: &NewCompany) -> DbResult<Company> {
        input.validate()?;
        let ruc = input.ruc.trim();

        debug!(ruc = %ruc, "Creating company");

        let mut conn = self.pool.acquire().await?;
        self.ensure_ruc_available(&mut conn, ruc, None).await?;

        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO companies (
                name, ruc, phone, sri_access_key, address,
                tax_percentage, client_name, client_ruc, created_at, search_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(ruc)
        .bind(input.phone.trim())
        .bind(input.sri_access_key.trim())
        .bind(input.address.trim())
        .bind(input.tax_percentage.to_string())
        .bind(trimmed_optional(&input.client_name))
        .bind(trimmed_optional(&input.client_ruc))
        .bind(now)
        .bind(search_key(&[input.name.trim(), ruc]))
        .fetch_one(&mut *conn)
        .await?;

        info!(id, ruc = %ruc, "Company created");

        fetch_company(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Company", id))
    }

    /// Gets a company by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Company>> {
        let mut conn = self.pool.acquire().await?;
        fetch_company(&mut conn, id).await
    }

    /// Gets the default company (the first one registered).
    pub async fn get_default(&self) -> DbResult<Option<Company>> {
        let mut conn = self.pool.acquire().await?;
        fetch_default_company(&mut conn).await
    }

    /// Lists companies ordered by name, optionally filtered by name or RUC.
    ///
    /// The search is a Unicode case-insensitive substring match.
    pub async fn list(&self, search: Option<&str>, page: u32, per_page: u32) -> DbResult<Page<Company>> {
        validate_page(page, per_page)?;
        let pattern = match search {
            Some(query) => validate_search_query(query)?.map(|q| like_pattern(&q)),
            None => None,
        };

        let total_items: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM companies
            WHERE ?1 IS NULL OR search_key LIKE ?1 ESCAPE '\'
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
            SELECT {COMPANY_COLUMNS} FROM companies
            WHERE ?1 IS NULL OR search_key LIKE ?1 ESCAPE '\'
            ORDER BY name ASC, id ASC
            LIMIT ?2 OFFSET ?3
            "#
        );
        let rows: Vec<CompanyRow> = sqlx::query_as(&sql)
            .bind(pattern.as_deref())
            .bind(i64::from(per_page))
            .bind(page_offset(page, per_page))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Company::try_from)
                .collect::<DbResult<Vec<_>>>()?,
            page,
            per_page,
            total_items: total_items.max(0) as u64,
        })
    }

    /// Replaces every editable field of a company.
    pub async fn update(&self, id: i64, input: &NewCompany) -> DbResult<Company> {
        input.validate()?;
        let ruc = input.ruc.trim();

        let mut conn = self.pool.acquire().await?;
        self.ensure_ruc_available(&mut conn, ruc, Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE companies SET
                name = ?1, ruc = ?2, phone = ?3, sri_access_key = ?4, address = ?5,
                tax_percentage = ?6, client_name = ?7, client_ruc = ?8, search_key = ?9
            WHERE id = ?10
            "#,
        )
        .bind(input.name.trim())
        .bind(ruc)
        .bind(input.phone.trim())
        .bind(input.sri_access_key.trim())
        .bind(input.address.trim())
        .bind(input.tax_percentage.to_string())
        .bind(trimmed_optional(&input.client_name))
        .bind(trimmed_optional(&input.client_ruc))
        .bind(search_key(&[input.name.trim(), ruc]))
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", id));
        }

        debug!(id, "Company updated");

        fetch_company(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Company", id))
    }

    /// Changes the IVA rate applied to tickets created from now on.
    pub async fn update_tax_percentage(&self, id: i64, tax_percentage: TaxPercentage) -> DbResult<Company> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query("UPDATE companies SET tax_percentage = ?1 WHERE id = ?2")
            .bind(tax_percentage.to_string())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", id));
        }

        info!(id, tax_percentage = %tax_percentage, "Company IVA rate changed");

        fetch_company(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Company", id))
    }

    /// Deletes a company together with its tickets and their details.
    ///
    /// Runs under the ticket write lock since it removes ticket rows.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let result = sqlx::query("DELETE FROM companies WHERE id = ?1")
            .bind(id)
            .execute(tx.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", id));
        }

        tx.commit().await?;
        info!(id, "Company deleted");
        Ok(())
    }

    /// Number of registered companies.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn ensure_ruc_available(
        &self,
        conn: &mut SqliteConnection,
        ruc: &str,
        except_id: Option<i64>,
    ) -> DbResult<()> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM companies WHERE ruc = ?1 AND (?2 IS NULL OR id != ?2)")
                .bind(ruc)
                .bind(except_id)
                .fetch_optional(conn)
                .await?;

        match existing {
            Some(_) => Err(DbError::duplicate("ruc", ruc)),
            None => Ok(()),
        }
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
    use ticketing_core::ValidationError;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = memory_db().await;
        let repo = db.companies();

        let mut input = new_company("0990000000001", dec!(12));
        input.name = "  Lubricadora Norte ".to_string();
        input.client_name = Some("   ".to_string());

        let company = repo.create(&input).await.unwrap();
        assert_eq!(company.name, "Lubricadora Norte");
        assert_eq!(company.tax_percentage.to_string(), "12.00");
        assert_eq!(company.client_name, None);

        let loaded = repo.get_by_id(company.id).await.unwrap().unwrap();
        assert_eq!(loaded, company);
        assert_eq!(repo.get_default().await.unwrap().unwrap().id, company.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ruc_rejected() {
        let db = memory_db().await;
        let repo = db.companies();

        let first = repo.create(&new_company("0990000000001", dec!(12))).await.unwrap();
        let err = repo.create(&new_company("0990000000001", dec!(15))).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "ruc"));

        let second = repo.create(&new_company("0990000000002", dec!(15))).await.unwrap();
        let err = repo
            .update(second.id, &new_company("0990000000001", dec!(15)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Keeping its own RUC is fine
        repo.update(first.id, &new_company("0990000000001", dec!(14))).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let db = memory_db().await;
        let err = db
            .companies()
            .create(&new_company("123", dec!(12)))
            .await
            .unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::TooShort { .. })));
        assert_eq!(db.companies().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_search_and_paging() {
        let db = memory_db().await;
        let repo = db.companies();

        for (i, name) in ["Cafe Sur", "Lubricadora Norte", "Llantera Centro"].iter().enumerate() {
            let mut input = new_company(&format!("099000000000{i}"), dec!(12));
            input.name = name.to_string();
            repo.create(&input).await.unwrap();
        }

        let page = repo.list(None, 1, 2).await.unwrap();
        assert_eq!(page.total_items, 3);
        assert_eq!(page.items[0].name, "Cafe Sur");
        assert!(page.has_next());

        let found = repo.list(Some("norte"), 1, 10).await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].name, "Lubricadora Norte");

        let none = repo.list(Some("100%"), 1, 10).await.unwrap();
        assert_eq!(none.total_items, 0);
    }

    #[tokio::test]
    async fn test_search_folds_accented_letters() {
        let db = memory_db().await;
        let repo = db.companies();
        let mut input = new_company("0990000000001", dec!(12));
        input.name = "Ñandú Repuestos".to_string();
        let company = repo.create(&input).await.unwrap();

        let found = repo.list(Some("ñandú"), 1, 10).await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(repo.list(Some("REPUESTOS"), 1, 10).await.unwrap().total_items, 1);

        input.name = "Árbol Motors".to_string();
        repo.update(company.id, &input).await.unwrap();
        assert_eq!(repo.list(Some("ñandú"), 1, 10).await.unwrap().total_items, 0);
        assert_eq!(repo.list(Some("árbol"), 1, 10).await.unwrap().total_items, 1);
    }

    #[tokio::test]
    async fn test_update_tax_percentage() {
        let db = memory_db().await;
        let repo = db.companies();
        let company = repo.create(&new_company("0990000000001", dec!(12))).await.unwrap();

        let updated = repo
            .update_tax_percentage(company.id, TaxPercentage::new(dec!(15)).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.tax_percentage.to_string(), "15.00");

        let err = repo
            .update_tax_percentage(999, TaxPercentage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_tickets() {
        let db = memory_db().await;
        let company = db.companies().create(&new_company("0990000000001", dec!(12))).await.unwrap();
        let created = db
            .tickets()
            .create(&new_ticket(company.id, vec![detail("Filtro", dec!(1), dec!(5))]))
            .await
            .unwrap();

        db.companies().delete(company.id).await.unwrap();

        assert!(db.tickets().get_by_id(created.ticket.id).await.unwrap().is_none());
        assert!(db.tickets().get_details(created.ticket.id).await.unwrap().is_empty());
        assert!(matches!(
            db.companies().delete(company.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
