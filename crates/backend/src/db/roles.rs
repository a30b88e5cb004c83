//! Role and permission repository.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nefol_core::{Permission, PermissionId, RoleId, StaffUserId, StandardRole};

use super::{RepositoryError, not_found_on_foreign_key};
use crate::models::staff::{PermissionRecord, Role, RolePermissions};

/// Internal row type for `staff_roles`.
#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i32,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: RoleId::new(row.id),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for `staff_permissions`.
#[derive(Debug, sqlx::FromRow)]
struct PermissionRow {
    id: i32,
    code: String,
    description: Option<String>,
}

impl From<PermissionRow> for PermissionRecord {
    fn from(row: PermissionRow) -> Self {
        Self {
            id: PermissionId::new(row.id),
            code: row.code,
            description: row.description,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MatrixRow {
    role_id: i32,
    role_name: String,
    permissions: Vec<String>,
}

/// What the standard seed created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SeedSummary {
    pub roles: usize,
    pub permissions: usize,
    pub grants: u64,
}

/// Repository for roles, permissions and their assignments.
pub struct RoleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleRepository<'a> {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, RepositoryError> {
        let row = sqlx::query_as::<_, RoleRow>(
            "INSERT INTO staff_roles (name, description) VALUES ($1, $2) \
             RETURNING id, name, description, created_at",
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "Role already exists"))?;
        Ok(row.into())
    }

    /// All roles ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_roles(&self) -> Result<Vec<Role>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at FROM staff_roles ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Find a role by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn role_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at FROM staff_roles WHERE lower(name) = lower($1)",
        )
        .bind(name.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create_permission(
        &self,
        code: &str,
        description: Option<&str>,
    ) -> Result<PermissionRecord, RepositoryError> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "INSERT INTO staff_permissions (code, description) VALUES ($1, $2) \
             RETURNING id, code, description",
        )
        .bind(code)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "Permission already exists"))?;
        Ok(row.into())
    }

    /// All permissions ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, code, description FROM staff_permissions ORDER BY code",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Grant a permission to a role. Granting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role or permission does not exist.
    pub async fn assign_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO staff_role_permissions (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(self.pool)
        .await
        .map_err(not_found_on_foreign_key)?;
        Ok(())
    }

    /// Every role with its granted permission codes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn matrix(&self) -> Result<Vec<RolePermissions>, RepositoryError> {
        let rows = sqlx::query_as::<_, MatrixRow>(
            "SELECT r.id AS role_id, r.name AS role_name, \
                    COALESCE(array_agg(p.code ORDER BY p.code) FILTER (WHERE p.code IS NOT NULL), '{}') AS permissions \
             FROM staff_roles r \
             LEFT JOIN staff_role_permissions rp ON rp.role_id = r.id \
             LEFT JOIN staff_permissions p ON p.id = rp.permission_id \
             GROUP BY r.id \
             ORDER BY r.name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RolePermissions {
                role_id: RoleId::new(row.role_id),
                role_name: row.role_name,
                permissions: row.permissions,
            })
            .collect())
    }

    /// Replace a role's permissions with `codes` in one transaction.
    ///
    /// Unknown codes are ignored. Returns the number of grants written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role does not exist.
    pub async fn set_role_permissions(&self, role_id: RoleId, codes: &[String]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM staff_roles WHERE id = $1)")
            .bind(role_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM staff_role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO staff_role_permissions (role_id, permission_id) \
             SELECT $1, id FROM staff_permissions WHERE code = ANY($2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(codes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted.rows_affected())
    }

    /// Give a staff user a role. Assigning twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff user or role does not exist.
    pub async fn assign_role(&self, staff_id: StaffUserId, role_id: RoleId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO staff_user_roles (staff_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(staff_id)
        .bind(role_id)
        .execute(self.pool)
        .await
        .map_err(not_found_on_foreign_key)?;
        Ok(())
    }

    /// Role names held by a staff user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn roles_for(&self, staff_id: StaffUserId) -> Result<Vec<String>, RepositoryError> {
        let roles = sqlx::query_scalar(
            "SELECT r.name FROM staff_roles r \
             JOIN staff_user_roles ur ON ur.role_id = r.id \
             WHERE ur.staff_id = $1 ORDER BY r.name",
        )
        .bind(staff_id)
        .fetch_all(self.pool)
        .await?;
        Ok(roles)
    }

    /// Union of the permission codes granted by a staff user's roles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn permissions_for(&self, staff_id: StaffUserId) -> Result<BTreeSet<String>, RepositoryError> {
        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT p.code FROM staff_permissions p \
             JOIN staff_role_permissions rp ON rp.permission_id = p.id \
             JOIN staff_user_roles ur ON ur.role_id = rp.role_id \
             WHERE ur.staff_id = $1",
        )
        .bind(staff_id)
        .fetch_all(self.pool)
        .await?;
        Ok(codes.into_iter().collect())
    }

    /// Create the standard roles and permissions and grant the standard matrix.
    ///
    /// Safe to run repeatedly: existing rows are kept and missing grants added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn seed_standard(&self) -> Result<SeedSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = SeedSummary::default();

        for permission in Permission::ALL {
            sqlx::query(
                "INSERT INTO staff_permissions (code, description) VALUES ($1, $2) \
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(permission.code())
            .bind(permission.description())
            .execute(&mut *tx)
            .await?;
            summary.permissions += 1;
        }

        for role in StandardRole::ALL {
            let role_id: i32 = sqlx::query_scalar(
                "INSERT INTO staff_roles (name, description) VALUES ($1, $2) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                 RETURNING id",
            )
            .bind(role.name())
            .bind(role.description())
            .fetch_one(&mut *tx)
            .await?;
            summary.roles += 1;

            let codes: Vec<&str> = role.permissions().iter().map(Permission::code).collect();
            let granted = sqlx::query(
                "INSERT INTO staff_role_permissions (role_id, permission_id) \
                 SELECT $1, id FROM staff_permissions WHERE code = ANY($2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(role_id)
            .bind(&codes)
            .execute(&mut *tx)
            .await?;
            summary.grants += granted.rows_affected();
        }

        tx.commit().await?;
        Ok(summary)
    }
}
