//! Database operations for the NEFOL `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `orders`, `order_status_history`, `order_cancellations` - Orders and their lifecycle
//! - `invoice_sequence`, `invoice_sequence_14digits`, `invoice_numbers` - Numbering counters
//! - `store_settings` - Invoice settings and alert configuration (JSONB)
//! - `admin_notifications` - Admin notification feed
//! - `staff_*` - Staff accounts, roles, permissions, sessions and activity logs
//! - `shiprocket_config`, `shiprocket_shipments` - Shiprocket credentials and shipments
//!
//! # Migrations
//!
//! Migrations are stored in `crates/backend/migrations/` and run via:
//! ```bash
//! cargo run -p nefol-cli -- migrate
//! ```

pub mod activity;
pub mod notifications;
pub mod orders;
pub mod roles;
pub mod sequences;
pub mod settings;
pub mod shiprocket;
pub mod staff;
pub mod staff_sessions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use activity::ActivityRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use roles::RoleRepository;
pub use sequences::SequenceRepository;
pub use settings::SettingsRepository;
pub use shiprocket::ShipmentRepository;
pub use staff::StaffRepository;
pub use staff_sessions::StaffSessionRepository;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict` with the given message,
    /// passing every other error through.
    #[must_use]
    pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            return Self::Conflict(message.to_string());
        }
        Self::Database(err)
    }
}

/// Map a foreign-key violation into `NotFound`, passing every other error through.
pub(crate) fn not_found_on_foreign_key(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_` and `\` so user input can be embedded in an `ILIKE` pattern.
#[must_use]
pub fn like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    escaped.push('%');
    for c in input.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("N-09"), "%N-09%");
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn test_conflict_passthrough() {
        let err = RepositoryError::conflict_on_unique(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}
