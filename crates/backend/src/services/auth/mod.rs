//! Staff authentication service.
//!
//! Password login issues opaque bearer tokens (`staff_` followed by 96 hex
//! characters) stored in `staff_sessions`. Every security-relevant action is
//! written to the staff activity log.

mod error;

pub use error::StaffAuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;

use nefol_core::{Email, StaffUserId};

use crate::db::staff_sessions::SessionOwner;
use crate::db::{
    ActivityRepository, RepositoryError, RoleRepository, StaffRepository, StaffSessionRepository,
};
use crate::models::{ClientInfo, PagePermission, StaffContext, StaffUser};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Prefix of every staff token.
pub const TOKEN_PREFIX: &str = "staff_";

/// Random bytes behind a token.
const TOKEN_BYTES: usize = 48;

/// Generate a fresh staff token.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

/// Whether `token` has the shape of a staff token.
#[must_use]
pub fn is_well_formed_token(token: &str) -> bool {
    token
        .strip_prefix(TOKEN_PREFIX)
        .is_some_and(|hex| hex.len() == TOKEN_BYTES * 2 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub staff: StaffContext,
}

/// One entry of a bulk staff import.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkStaffEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Outcome of one bulk import entry.
#[derive(Debug, Clone, Serialize)]
pub struct BulkStaffResult {
    pub email: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StaffUserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkStaffReport {
    pub results: Vec<BulkStaffResult>,
    pub created: usize,
    pub failed: usize,
}

/// Staff authentication and account service.
pub struct StaffAuthService<'a> {
    pool: &'a PgPool,
    staff: StaffRepository<'a>,
    sessions: StaffSessionRepository<'a>,
    activity: ActivityRepository<'a>,
}

impl<'a> StaffAuthService<'a> {
    /// Create a new staff authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            staff: StaffRepository::new(pool),
            sessions: StaffSessionRepository::new(pool),
            activity: ActivityRepository::new(pool),
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `StaffAuthError::InvalidCredentials` for unknown or inactive
    /// accounts and wrong passwords.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ttl: Duration,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, StaffAuthError> {
        let email = Email::parse(email).map_err(|_| StaffAuthError::InvalidCredentials)?;
        let Some((user, password_hash)) = self.staff.credentials_by_email(&email).await? else {
            return Err(StaffAuthError::InvalidCredentials);
        };
        if !user.is_active {
            return Err(StaffAuthError::InvalidCredentials);
        }

        if verify_password(password, &password_hash).is_err() {
            self.staff.record_failed_login(user.id).await?;
            self.record(Some(user.id), "login_failed", json!({ "email": email.as_str() }), client)
                .await;
            return Err(StaffAuthError::InvalidCredentials);
        }

        let token = generate_token();
        let expires_at = Utc::now() + ttl;
        self.sessions.create(user.id, &token, expires_at, client).await?;
        self.staff.record_login(user.id).await?;
        self.record(Some(user.id), "login", json!({}), client).await;

        let staff = self.context(user.id, user.name, user.email).await?;
        tracing::info!(staff_id = %user.id, "Staff login");

        Ok(LoginOutcome { token, expires_at, staff })
    }

    /// Resolve a bearer token to its staff context.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn context_for_token(&self, token: &str) -> Result<Option<StaffContext>, RepositoryError> {
        if !is_well_formed_token(token) {
            return Ok(None);
        }
        let Some(SessionOwner { staff_id, name, email, .. }) = self.sessions.resolve(token).await? else {
            return Ok(None);
        };
        self.context(staff_id, name, email).await.map(Some)
    }

    /// Build the full context of a staff member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a lookup fails.
    pub async fn context(
        &self,
        id: StaffUserId,
        name: String,
        email: Email,
    ) -> Result<StaffContext, RepositoryError> {
        let roles = RoleRepository::new(self.pool);
        Ok(StaffContext {
            id,
            name,
            email,
            roles: roles.roles_for(id).await?,
            permissions: roles.permissions_for(id).await?,
            page_permissions: self.staff.page_permissions(id).await?,
        })
    }

    /// Revoke the caller's token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update fails.
    pub async fn logout(&self, staff: &StaffContext, token: &str, client: &ClientInfo) -> Result<(), StaffAuthError> {
        self.sessions.revoke(token).await?;
        self.staff.record_logout(staff.id).await?;
        self.record(Some(staff.id), "logout", json!({}), client).await;
        Ok(())
    }

    /// Change the caller's own password and revoke their other sessions.
    ///
    /// # Errors
    ///
    /// Returns `WeakPassword`, `PasswordMismatch` or `WrongCurrentPassword`
    /// when validation fails.
    pub async fn change_password(
        &self,
        staff: &StaffContext,
        token: &str,
        current: &str,
        new_password: &str,
        confirm: &str,
        client: &ClientInfo,
    ) -> Result<(), StaffAuthError> {
        validate_password(new_password)?;
        if new_password != confirm {
            return Err(StaffAuthError::PasswordMismatch);
        }

        let hash = self
            .staff
            .password_hash(staff.id)
            .await?
            .ok_or(StaffAuthError::StaffNotFound)?;
        if verify_password(current, &hash).is_err() {
            self.record(Some(staff.id), "password_change_failed", json!({}), client)
                .await;
            return Err(StaffAuthError::WrongCurrentPassword);
        }

        self.staff.set_password(staff.id, &hash_password(new_password)?).await?;
        let revoked = self.sessions.revoke_all(staff.id, Some(token)).await?;
        self.record(
            Some(staff.id),
            "password_changed",
            json!({ "revoked_sessions": revoked }),
            client,
        )
        .await;
        Ok(())
    }

    // =========================================================================
    // Account management
    // =========================================================================

    /// Create a staff account, optionally assigning a role by name.
    ///
    /// # Errors
    ///
    /// Returns `StaffAlreadyExists` on a duplicate email and `RoleNotFound`
    /// for an unknown role (the account is not created).
    pub async fn create_staff(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Option<&str>,
        actor: Option<StaffUserId>,
        client: &ClientInfo,
    ) -> Result<StaffUser, StaffAuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StaffAuthError::MissingField("Name"));
        }
        let email = Email::parse(email)?;
        validate_password(password)?;

        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            Some(role_name) => Some(
                RoleRepository::new(self.pool)
                    .role_by_name(role_name)
                    .await?
                    .ok_or_else(|| StaffAuthError::RoleNotFound(role_name.to_string()))?,
            ),
            None => None,
        };

        let user = self
            .staff
            .create(name, &email, &hash_password(password)?)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => StaffAuthError::StaffAlreadyExists,
                other => StaffAuthError::Repository(other),
            })?;
        self.record(
            actor,
            "staff_create",
            json!({ "staff_id": user.id, "email": user.email.as_str() }),
            client,
        )
        .await;

        if let Some(role) = role {
            RoleRepository::new(self.pool).assign_role(user.id, role.id).await?;
            self.record(
                actor,
                "assign_role",
                json!({ "staff_id": user.id, "role_id": role.id, "role": role.name }),
                client,
            )
            .await;
        }

        Ok(user)
    }

    /// Create many accounts. Failures are reported per entry.
    pub async fn bulk_create(
        &self,
        entries: &[BulkStaffEntry],
        actor: Option<StaffUserId>,
        client: &ClientInfo,
    ) -> BulkStaffReport {
        let mut report = BulkStaffReport::default();
        for entry in entries {
            let outcome = self
                .create_staff(
                    &entry.name,
                    &entry.email,
                    &entry.password,
                    entry.role.as_deref(),
                    actor,
                    client,
                )
                .await;
            let result = match outcome {
                Ok(user) => {
                    report.created += 1;
                    BulkStaffResult {
                        email: user.email.into_inner(),
                        success: true,
                        id: Some(user.id),
                        error: None,
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    BulkStaffResult {
                        email: entry.email.trim().to_string(),
                        success: false,
                        id: None,
                        error: Some(bulk_error_message(&e)),
                    }
                }
            };
            report.results.push(result);
        }
        report
    }

    /// Assign an existing role to a staff member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if either does not exist.
    pub async fn assign_role(
        &self,
        staff_id: StaffUserId,
        role_id: nefol_core::RoleId,
        actor: Option<StaffUserId>,
        client: &ClientInfo,
    ) -> Result<(), StaffAuthError> {
        RoleRepository::new(self.pool).assign_role(staff_id, role_id).await?;
        self.record(
            actor,
            "assign_role",
            json!({ "staff_id": staff_id, "role_id": role_id }),
            client,
        )
        .await;
        Ok(())
    }

    /// Set a new password for another staff member and end their sessions.
    ///
    /// # Errors
    ///
    /// Returns `StaffNotFound` for unknown accounts, `WeakPassword` for short
    /// passwords.
    pub async fn reset_password(
        &self,
        staff_id: StaffUserId,
        new_password: &str,
        actor: Option<StaffUserId>,
        client: &ClientInfo,
    ) -> Result<(), StaffAuthError> {
        validate_password(new_password)?;
        self.staff
            .set_password(staff_id, &hash_password(new_password)?)
            .await
            .map_err(not_found_as_staff)?;
        let revoked = self.sessions.revoke_all(staff_id, None).await?;
        self.record(
            actor,
            "password_reset",
            json!({ "staff_id": staff_id, "revoked_sessions": revoked }),
            client,
        )
        .await;
        Ok(())
    }

    /// Deactivate a staff member and end their sessions.
    ///
    /// # Errors
    ///
    /// Returns `StaffNotFound` for unknown accounts.
    pub async fn disable(
        &self,
        staff_id: StaffUserId,
        actor: Option<StaffUserId>,
        client: &ClientInfo,
    ) -> Result<(), StaffAuthError> {
        self.staff.disable(staff_id).await.map_err(not_found_as_staff)?;
        let revoked = self.sessions.revoke_all(staff_id, None).await?;
        self.record(
            actor,
            "staff_disabled",
            json!({ "staff_id": staff_id, "revoked_sessions": revoked }),
            client,
        )
        .await;
        Ok(())
    }

    /// Replace a staff member's page permissions.
    ///
    /// # Errors
    ///
    /// Returns `StaffNotFound` for unknown accounts.
    pub async fn set_page_permissions(
        &self,
        staff_id: StaffUserId,
        pages: &[PagePermission],
        actor: Option<StaffUserId>,
        client: &ClientInfo,
    ) -> Result<(), StaffAuthError> {
        self.staff
            .set_page_permissions(staff_id, pages)
            .await
            .map_err(not_found_as_staff)?;
        self.record(
            actor,
            "assign_page_permissions",
            json!({ "staff_id": staff_id, "pages": pages.len() }),
            client,
        )
        .await;
        Ok(())
    }

    /// Write an activity log entry. Logging failures never fail the action.
    async fn record(&self, staff_id: Option<StaffUserId>, action: &str, details: Value, client: &ClientInfo) {
        if let Err(e) = self.activity.log(staff_id, action, &details, client).await {
            tracing::warn!(action = %action, error = %e, "Failed to write staff activity log");
        }
    }
}

fn not_found_as_staff(err: RepositoryError) -> StaffAuthError {
    match err {
        RepositoryError::NotFound => StaffAuthError::StaffNotFound,
        other => StaffAuthError::Repository(other),
    }
}

/// Message reported for a failed bulk entry.
fn bulk_error_message(err: &StaffAuthError) -> String {
    match err {
        StaffAuthError::Repository(_) | StaffAuthError::PasswordHash => {
            "Failed to create staff user".to_string()
        }
        other => other.to_string(),
    }
}

/// Validate a new password.
///
/// # Errors
///
/// Returns `StaffAuthError::WeakPassword` if it is too short.
pub fn validate_password(password: &str) -> Result<(), StaffAuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(StaffAuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `StaffAuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, StaffAuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| StaffAuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), StaffAuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| StaffAuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| StaffAuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert!(token.starts_with("staff_"));
        assert_eq!(token.len(), "staff_".len() + 96);
        assert!(is_well_formed_token(&token));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        assert!(!is_well_formed_token(""));
        assert!(!is_well_formed_token("staff_abc"));
        assert!(!is_well_formed_token(&format!("user_{}", "a".repeat(96))));
        assert!(!is_well_formed_token(&format!("staff_{}", "g".repeat(96))));
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(StaffAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(StaffAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_bulk_error_messages() {
        assert_eq!(bulk_error_message(&StaffAuthError::StaffAlreadyExists), "Email already exists");
        assert_eq!(
            bulk_error_message(&StaffAuthError::Repository(RepositoryError::NotFound)),
            "Failed to create staff user"
        );
        assert_eq!(
            bulk_error_message(&StaffAuthError::MissingField("Name")),
            "Name is required"
        );
    }
}
