//! Staff activity (audit) log repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use nefol_core::StaffUserId;

use super::{RepositoryError, like_pattern};
use crate::models::staff::{ActivityEntry, ClientInfo};

/// Maximum entries returned by a single listing.
pub const ACTIVITY_LIST_LIMIT: i64 = 500;

/// Filters for the activity listing. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub staff_id: Option<StaffUserId>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: i32,
    staff_id: Option<i32>,
    staff_name: Option<String>,
    staff_email: Option<String>,
    action: String,
    details: serde_json::Value,
    ip: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityEntry {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            staff_id: row.staff_id.map(StaffUserId::new),
            staff_name: row.staff_name,
            staff_email: row.staff_email,
            action: row.action,
            details: row.details,
            ip: row.ip,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Repository for the staff audit trail.
pub struct ActivityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityRepository<'a> {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry to the audit trail.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log(
        &self,
        staff_id: Option<StaffUserId>,
        action: &str,
        details: &serde_json::Value,
        client: &ClientInfo,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO staff_activity_logs (staff_id, action, details, ip, user_agent) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(staff_id)
        .bind(action)
        .bind(details)
        .bind(&client.ip)
        .bind(&client.user_agent)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Newest entries first, at most [`ACTIVITY_LIST_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let mut query = list_query(filter);
        let rows = query
            .build_query_as::<ActivityRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

fn list_query(filter: &ActivityFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(
        "SELECT l.id, l.staff_id, u.name AS staff_name, u.email AS staff_email, l.action, \
                l.details, l.ip, l.user_agent, l.created_at \
         FROM staff_activity_logs l \
         LEFT JOIN staff_users u ON u.id = l.staff_id \
         WHERE 1 = 1",
    );

    if let Some(staff_id) = filter.staff_id {
        query.push(" AND l.staff_id = ").push_bind(staff_id);
    }
    if let Some(action) = filter.action.as_deref().filter(|a| !a.trim().is_empty()) {
        query.push(" AND l.action ILIKE ").push_bind(like_pattern(action));
    }
    if let Some(from) = filter.from {
        query.push(" AND l.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND l.created_at <= ").push_bind(to);
    }

    query
        .push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
        .push_bind(ACTIVITY_LIST_LIMIT);
    query
}
