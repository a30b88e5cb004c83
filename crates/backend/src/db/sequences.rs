//! Numbering counters for order and invoice numbers.
//!
//! Each counter is a single row incremented with one `UPSERT ... RETURNING`
//! statement, so concurrent requests never observe the same value.

use sqlx::PgPool;

use nefol_core::OrderId;

use super::RepositoryError;

/// Attempts made when two requests race for the same legacy sequence number.
const LEGACY_INSERT_ATTEMPTS: usize = 3;

/// Repository for the numbering tables.
pub struct SequenceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SequenceRepository<'a> {
    /// Create a new sequence repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Advance the order-number counter (starts at 1000, first value 1001).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn next_order_sequence(&self) -> Result<i32, RepositoryError> {
        let next: i32 = sqlx::query_scalar(
            "INSERT INTO invoice_sequence (id, current_number) VALUES (1, 1001) \
             ON CONFLICT (id) DO UPDATE \
                SET current_number = invoice_sequence.current_number + 1, updated_at = NOW() \
             RETURNING current_number",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(next)
    }

    /// Advance the 14-digit invoice counter (starts at 0, first value 1).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn next_invoice_sequence(&self) -> Result<i64, RepositoryError> {
        let next: i64 = sqlx::query_scalar(
            "INSERT INTO invoice_sequence_14digits (id, current_number) VALUES (1, 1) \
             ON CONFLICT (id) DO UPDATE \
                SET current_number = invoice_sequence_14digits.current_number + 1, updated_at = NOW() \
             RETURNING current_number",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(next)
    }

    /// Legacy invoice number already issued to an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn legacy_number_for(&self, order_id: OrderId) -> Result<Option<String>, RepositoryError> {
        let number = sqlx::query_scalar("SELECT invoice_number FROM invoice_numbers WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(number)
    }

    /// Issue the next legacy sequence of `financial_year` to `order_id`.
    ///
    /// `format` turns the sequence into the stored invoice number. If the order
    /// already holds a legacy number, that number is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the sequence stayed contended.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn issue_legacy_number(
        &self,
        order_id: OrderId,
        financial_year: &str,
        format: impl Fn(i32) -> String,
    ) -> Result<String, RepositoryError> {
        for _ in 0..LEGACY_INSERT_ATTEMPTS {
            let sequence: i32 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM invoice_numbers WHERE financial_year = $1",
            )
            .bind(financial_year)
            .fetch_one(self.pool)
            .await?;

            let invoice_number = format(sequence);
            let inserted = sqlx::query(
                "INSERT INTO invoice_numbers (order_id, invoice_number, financial_year, sequence) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (order_id) DO NOTHING",
            )
            .bind(order_id)
            .bind(&invoice_number)
            .bind(financial_year)
            .bind(sequence)
            .execute(self.pool)
            .await;

            match inserted {
                Ok(result) if result.rows_affected() == 1 => return Ok(invoice_number),
                Ok(_) => {
                    return self
                        .legacy_number_for(order_id)
                        .await?
                        .ok_or(RepositoryError::NotFound);
                }
                Err(e) => match RepositoryError::conflict_on_unique(e, "legacy invoice sequence taken") {
                    RepositoryError::Conflict(_) => {
                        tracing::debug!(financial_year, sequence, "Legacy invoice sequence raced, retrying");
                    }
                    other => return Err(other),
                },
            }
        }

        Err(RepositoryError::Conflict(format!(
            "could not allocate a legacy invoice number for {financial_year}"
        )))
    }
}
