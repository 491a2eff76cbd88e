//! # ticketing-db: Database Layer for Sales Tickets
//!
//! This crate provides database access for the ticket ledger.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ticket Ledger Data Flow                          │
//! │                                                                         │
//! │  Caller (seed binary, service layer)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  ticketing-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ CompanyRepo    │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ TicketRepo     │   │ 001_init.sql │  │   │
//! │  │   │ busy timeout  │    │ Sequencer      │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │                     $TICKETING_DB_PATH                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Companies, tickets and document numbering
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ticketing_db::{AppConfig, Database};
//!
//! let config = AppConfig::load()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let created = db.tickets().create(&new_ticket).await?;
//! println!("{}", created.ticket.document_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::company::CompanyRepository;
pub use repository::sequence::DocumentSequencer;
pub use repository::ticket::TicketRepository;
pub use repository::WriteTransaction;
