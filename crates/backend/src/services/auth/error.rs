//! Staff authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during staff authentication and account management.
#[derive(Debug, Error)]
pub enum StaffAuthError {
    /// Invalid email format.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] nefol_core::EmailError),

    /// Unknown email, inactive account or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password too short or otherwise unacceptable.
    #[error("{0}")]
    WeakPassword(String),

    /// New password and its confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// The current password supplied for a change did not verify.
    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Email already registered.
    #[error("Email already exists")]
    StaffAlreadyExists,

    /// Staff account not found.
    #[error("Staff user not found")]
    StaffNotFound,

    /// Named role does not exist.
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Password hashing error.
    #[error("Password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}
