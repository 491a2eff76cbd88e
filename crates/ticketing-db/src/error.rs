//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (ticketing-core)          │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── is_transient() → caller may retry the whole operation        │
//! │       ▼                                                                 │
//! │  Caller reports per-field or "try again"                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use ticketing_core::{CoreError, ValidationError};

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate company RUC
    /// - Duplicate document number (indicates a lock discipline defect)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// An immutable column was written.
    #[error("Immutable field changed: {0}")]
    ImmutableField(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The database write lock could not be taken before the busy timeout.
    ///
    /// The transaction has been rolled back; nothing was written.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// Ticket creation kept losing the write lock race.
    ///
    /// Transient: no number was consumed and the caller may try again.
    #[error("Could not allocate a document number after {attempts} attempts, try again")]
    SequencingConflict { attempts: u32 },

    /// A stored value could not be decoded (e.g. a malformed decimal).
    #[error("Corrupt {column} value '{value}': {reason}")]
    CorruptRow {
        column: String,
        value: String,
        reason: String,
    },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Domain rule violation (validation, numbering, arithmetic).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a CorruptRow error.
    pub fn corrupt(column: impl Into<String>, value: impl Into<String>, reason: impl ToString) -> Self {
        DbError::CorruptRow {
            column: column.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the whole operation from scratch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::SequencingConflict { .. } | DbError::PoolExhausted
        )
    }

    /// The validation failure inside this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            DbError::Domain(CoreError::Validation(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

fn is_lock_error(code: Option<&str>, msg: &str) -> bool {
    let primary = code.and_then(|c| c.parse::<i32>().ok()).map(|c| (c & 0xff).to_string());
    matches!(primary.as_deref(), Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
        || msg.contains("database is locked")
        || msg.contains("database table is locked")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint / lock / trigger by code and message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if is_lock_error(code.as_deref(), msg) {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("is immutable") {
                    DbError::ImmutableField(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
