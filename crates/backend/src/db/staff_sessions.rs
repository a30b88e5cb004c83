//! Bearer-token sessions for staff users.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nefol_core::{Email, StaffUserId};

use super::RepositoryError;
use crate::models::staff::ClientInfo;

/// The staff user a live session token belongs to.
#[derive(Debug, Clone)]
pub struct SessionOwner {
    pub staff_id: StaffUserId,
    pub name: String,
    pub email: Email,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionOwnerRow {
    staff_id: i32,
    name: String,
    email: String,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionOwnerRow> for SessionOwner {
    type Error = RepositoryError;

    fn try_from(row: SessionOwnerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            staff_id: StaffUserId::new(row.staff_id),
            name: row.name,
            email,
            expires_at: row.expires_at,
        })
    }
}

/// Repository for staff sessions.
pub struct StaffSessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffSessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        staff_id: StaffUserId,
        token: &str,
        expires_at: DateTime<Utc>,
        client: &ClientInfo,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO staff_sessions (staff_id, token, expires_at, ip, user_agent) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(staff_id)
        .bind(token)
        .bind(expires_at)
        .bind(&client.ip)
        .bind(&client.user_agent)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a token to its owner.
    ///
    /// Revoked or expired tokens and tokens of deactivated accounts resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn resolve(&self, token: &str) -> Result<Option<SessionOwner>, RepositoryError> {
        sqlx::query_as::<_, SessionOwnerRow>(
            "SELECT u.id AS staff_id, u.name, u.email, s.expires_at \
             FROM staff_sessions s \
             JOIN staff_users u ON u.id = s.staff_id \
             WHERE s.token = $1 \
               AND s.revoked_at IS NULL \
               AND s.expires_at > NOW() \
               AND u.is_active = TRUE",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Revoke a single token. Returns whether a live session was revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke(&self, token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE staff_sessions SET revoked_at = NOW() WHERE token = $1 AND revoked_at IS NULL",
        )
        .bind(token)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every live session of a staff user, optionally keeping one token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke_all(&self, staff_id: StaffUserId, keep: Option<&str>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE staff_sessions SET revoked_at = NOW() \
             WHERE staff_id = $1 AND revoked_at IS NULL AND ($2::TEXT IS NULL OR token <> $2)",
        )
        .bind(staff_id)
        .bind(keep)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
