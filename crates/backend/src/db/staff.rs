//! Staff user repository for database operations.
//!
//! Password hashes are only read by the login and password-change paths and
//! never leave this module inside a `StaffUser`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nefol_core::{Email, StaffUserId};

use super::RepositoryError;
use crate::models::staff::{PagePermission, StaffUser, StaffWithRoles};

const STAFF_COLUMNS: &str = "id, name, email, is_active, failed_login_attempts, last_login_at, \
     last_logout_at, last_failed_login_at, password_changed_at, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` staff user queries.
#[derive(Debug, sqlx::FromRow)]
struct StaffRow {
    id: i32,
    name: String,
    email: String,
    is_active: bool,
    failed_login_attempts: i32,
    last_login_at: Option<DateTime<Utc>>,
    last_logout_at: Option<DateTime<Utc>>,
    last_failed_login_at: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StaffRow> for StaffUser {
    type Error = RepositoryError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: StaffUserId::new(row.id),
            name: row.name,
            email,
            is_active: row.is_active,
            failed_login_attempts: row.failed_login_attempts,
            last_login_at: row.last_login_at,
            last_logout_at: row.last_logout_at,
            last_failed_login_at: row.last_failed_login_at,
            password_changed_at: row.password_changed_at,
            created_at: row.created_at,
        })
    }
}

/// Staff row joined with the aggregated role names.
#[derive(Debug, sqlx::FromRow)]
struct StaffWithRolesRow {
    #[sqlx(flatten)]
    staff: StaffRow,
    roles: Vec<String>,
}

/// Staff row together with the password hash, for credential checks.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    staff: StaffRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PagePermissionRow {
    page_path: String,
    can_access: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for staff user database operations.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a staff user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<StaffUser, RepositoryError> {
        let sql = format!(
            "INSERT INTO staff_users (name, email, password_hash, password_changed_at) \
             VALUES ($1, $2, $3, NOW()) RETURNING {STAFF_COLUMNS}"
        );
        sqlx::query_as::<_, StaffRow>(&sql)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::conflict_on_unique(e, "Email already exists"))?
            .try_into()
    }

    /// Get a staff user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: StaffUserId) -> Result<Option<StaffUser>, RepositoryError> {
        let sql = format!("SELECT {STAFF_COLUMNS} FROM staff_users WHERE id = $1");
        sqlx::query_as::<_, StaffRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get a staff user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(StaffUser, String)>, RepositoryError> {
        let sql = format!(
            "SELECT {STAFF_COLUMNS}, password_hash FROM staff_users WHERE lower(email) = lower($1)"
        );
        let Some(row) = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some((row.staff.try_into()?, row.password_hash)))
    }

    /// Get the password hash of a staff user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn password_hash(&self, id: StaffUserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar("SELECT password_hash FROM staff_users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(hash)
    }

    /// Count a failed login attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_failed_login(&self, id: StaffUserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE staff_users SET failed_login_attempts = failed_login_attempts + 1, \
             last_failed_login_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Reset failure counters and stamp the login time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_login(&self, id: StaffUserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE staff_users SET failed_login_attempts = 0, last_login_at = NOW(), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Stamp the logout time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_logout(&self, id: StaffUserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE staff_users SET last_logout_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Replace a staff user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff user does not exist.
    pub async fn set_password(&self, id: StaffUserId, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE staff_users SET password_hash = $2, password_changed_at = NOW(), \
             failed_login_attempts = 0, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Deactivate a staff user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff user does not exist.
    pub async fn disable(&self, id: StaffUserId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE staff_users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List every staff user with their role names, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_roles(&self) -> Result<Vec<StaffWithRoles>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffWithRolesRow>(
            "SELECT u.id, u.name, u.email, u.is_active, u.failed_login_attempts, u.last_login_at, \
                    u.last_logout_at, u.last_failed_login_at, u.password_changed_at, u.created_at, \
                    COALESCE(array_agg(r.name ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles \
             FROM staff_users u \
             LEFT JOIN staff_user_roles ur ON ur.staff_id = u.id \
             LEFT JOIN staff_roles r ON r.id = ur.role_id \
             GROUP BY u.id \
             ORDER BY u.created_at DESC",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StaffWithRoles {
                    staff: row.staff.try_into()?,
                    roles: row.roles,
                })
            })
            .collect()
    }

    /// Page permissions of a staff user, by path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn page_permissions(&self, id: StaffUserId) -> Result<Vec<PagePermission>, RepositoryError> {
        let rows = sqlx::query_as::<_, PagePermissionRow>(
            "SELECT page_path, can_access FROM staff_page_permissions \
             WHERE staff_id = $1 ORDER BY page_path",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PagePermission {
                page_path: row.page_path,
                can_access: row.can_access,
            })
            .collect())
    }

    /// Replace a staff user's page permissions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff user does not exist.
    pub async fn set_page_permissions(
        &self,
        id: StaffUserId,
        pages: &[PagePermission],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM staff_users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM staff_page_permissions WHERE staff_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for page in pages {
            sqlx::query(
                "INSERT INTO staff_page_permissions (staff_id, page_path, can_access) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (staff_id, page_path) DO UPDATE SET can_access = EXCLUDED.can_access",
            )
            .bind(id)
            .bind(&page.page_path)
            .bind(page.can_access)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
