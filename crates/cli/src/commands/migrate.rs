//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! nefol-cli migrate
//! ```
//!
//! Migrations live in `crates/backend/migrations/` and are embedded at
//! compile time.

use super::{CommandError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending backend migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the connection or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running backend migrations...");
    sqlx::migrate!("../backend/migrations").run(&pool).await?;

    tracing::info!("Backend migrations complete!");
    Ok(())
}
