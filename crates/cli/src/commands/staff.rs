//! Staff account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a staff user with a generated password
//! nefol-cli staff create -e ops@thenefol.com -n "Ops" -r admin
//!
//! # Create a staff user reading the password from stdin
//! nefol-cli staff create -e ops@thenefol.com -n "Ops" --password-stdin < pw.txt
//!
//! # Seed admin/manager/staff/viewer and every permission
//! nefol-cli staff seed-roles
//! ```

use std::io::BufRead;

use rand::RngCore;
use thiserror::Error;

use nefol_backend::db::{RepositoryError, RoleRepository};
use nefol_backend::models::ClientInfo;
use nefol_backend::services::auth::{StaffAuthError, StaffAuthService};

use super::{CommandError, connect};

/// Bytes of randomness in a generated password (hex encoded, 24 chars).
const GENERATED_PASSWORD_BYTES: usize = 12;

/// Errors that can occur during staff operations.
#[derive(Debug, Error)]
pub enum StaffCommandError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Auth(#[from] StaffAuthError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Failed to read password from stdin: {0}")]
    Stdin(#[from] std::io::Error),

    #[error("Password from stdin is empty")]
    EmptyPassword,
}

/// A random hex password for accounts created without one.
fn generate_password() -> String {
    let mut bytes = [0u8; GENERATED_PASSWORD_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// First line of `reader`, without the line ending.
fn read_password(reader: impl BufRead) -> Result<String, StaffCommandError> {
    let line = reader.lines().next().transpose()?.unwrap_or_default();
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(StaffCommandError::EmptyPassword);
    }
    Ok(password)
}

/// Create a staff user and optionally assign a role.
///
/// # Errors
///
/// Returns `StaffCommandError` for invalid input, duplicate emails, unknown
/// roles or database failures.
pub async fn create(
    email: &str,
    name: &str,
    role: Option<&str>,
    password_stdin: bool,
) -> Result<(), StaffCommandError> {
    let (password, generated) = if password_stdin {
        (read_password(std::io::stdin().lock())?, false)
    } else {
        (generate_password(), true)
    };

    let pool = connect().await?;
    let user = StaffAuthService::new(&pool)
        .create_staff(name, email, &password, role, None, &ClientInfo::default())
        .await?;

    tracing::info!(
        "Staff user created! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        role.unwrap_or("(none)")
    );

    if generated {
        #[allow(clippy::print_stdout)]
        {
            println!("Generated password: {password}");
            println!("Ask the user to change it after the first login.");
        }
    }

    Ok(())
}

/// Create the standard roles and permissions.
///
/// # Errors
///
/// Returns `StaffCommandError` if the connection or a query fails.
pub async fn seed_roles() -> Result<(), StaffCommandError> {
    let pool = connect().await?;
    let summary = RoleRepository::new(&pool).seed_standard().await?;

    tracing::info!(?summary, "Standard roles and permissions seeded");
    Ok(())
}
