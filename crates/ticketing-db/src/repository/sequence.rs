//! # Document Number Sequencer
//!
//! Allocates fiscal document numbers inside the ticket write transaction.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Critical Section Per Ticket                      │
//! │                                                                         │
//! │  Writer A                         Writer B                              │
//! │  ────────                         ────────                              │
//! │  WriteTransaction::begin ✓        WriteTransaction::begin … waiting     │
//! │  SELECT last number → 000000041            │                            │
//! │  next = 000000042                          │                            │
//! │  INSERT ticket 000000042                   │                            │
//! │  COMMIT ─────────────────────────────────► ✓ lock acquired              │
//! │                                   SELECT last number → 000000042        │
//! │                                   INSERT ticket 000000043               │
//! │                                   COMMIT                                │
//! │                                                                         │
//! │  If A rolls back instead, B reads 000000041 and takes 000000042.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sequence is derived from the ticket rows themselves, so there is no
//! counter that can drift from what was actually committed.

use sqlx::SqliteConnection;
use tracing::debug;

use super::WriteTransaction;
use crate::error::DbResult;
use ticketing_core::{CoreError, DocumentNumber, TicketDraft};

/// Hands out document numbers. Only usable through a [`WriteTransaction`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentSequencer;

impl DocumentSequencer {
    /// Returns the raw document number of the most recently created ticket.
    pub async fn last_document_number(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
        let last: Option<String> =
            sqlx::query_scalar("SELECT document_number FROM tickets ORDER BY id DESC LIMIT 1")
                .fetch_optional(conn)
                .await?;

        Ok(last)
    }

    /// Chooses the next document number.
    ///
    /// The number is only reserved by inserting a ticket carrying it before
    /// `tx` commits. A malformed last number restarts the sequence at
    /// `000000001`.
    pub async fn allocate_next(tx: &mut WriteTransaction) -> DbResult<DocumentNumber> {
        let previous = Self::last_document_number(tx.conn()).await?;
        let next = DocumentNumber::next_after(previous.as_deref())?;

        debug!(
            previous = previous.as_deref().unwrap_or("<none>"),
            next = %next,
            "Allocated document number"
        );

        Ok(next)
    }

    /// Allocates a number and assigns it to `draft`.
    ///
    /// ## Errors
    /// [`CoreError::AlreadyNumbered`] if the draft already has a number;
    /// nothing is read in that case.
    pub async fn number_draft(
        tx: &mut WriteTransaction,
        draft: &mut TicketDraft,
    ) -> DbResult<DocumentNumber> {
        if let Some(existing) = &draft.document_number {
            return Err(CoreError::AlreadyNumbered {
                document_number: existing.to_string(),
            }
            .into());
        }

        let number = Self::allocate_next(tx).await?;
        draft.assign_document_number(number.clone())?;
        Ok(number)
    }
}
