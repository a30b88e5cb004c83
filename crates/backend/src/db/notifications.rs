//! Admin notification feed repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nefol_core::{NotificationId, NotificationPriority};

use super::RepositoryError;
use crate::models::notification::{AdminNotification, NewNotification};

const NOTIFICATION_COLUMNS: &str = "id, notification_type, title, message, link, icon, priority, \
     metadata, is_read, read_at, created_at";

/// Internal row type for `admin_notifications`.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i32,
    notification_type: String,
    title: String,
    message: String,
    link: Option<String>,
    icon: Option<String>,
    priority: String,
    metadata: serde_json::Value,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for AdminNotification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::new(row.id),
            notification_type: row.notification_type,
            title: row.title,
            message: row.message,
            link: row.link,
            icon: row.icon,
            // Unknown priorities are shown as medium rather than failing the feed
            priority: row.priority.parse().unwrap_or(NotificationPriority::Medium),
            metadata: row.metadata,
            is_read: row.is_read,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for admin notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, notification: &NewNotification) -> Result<AdminNotification, RepositoryError> {
        let sql = format!(
            "INSERT INTO admin_notifications \
                (notification_type, title, message, link, icon, priority, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(&notification.notification_type)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.link)
            .bind(&notification.icon)
            .bind(notification.priority.as_str())
            .bind(&notification.metadata)
            .fetch_one(self.pool)
            .await?;
        Ok(row.into())
    }

    /// Newest notifications first, optionally only unread ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, unread_only: bool, limit: i64) -> Result<Vec<AdminNotification>, RepositoryError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM admin_notifications \
             WHERE ($1 = FALSE OR is_read = FALSE) \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not exist.
    pub async fn mark_read(&self, id: NotificationId) -> Result<AdminNotification, RepositoryError> {
        let sql = format!(
            "UPDATE admin_notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Into::into)
            .ok_or(RepositoryError::NotFound)
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM admin_notifications WHERE is_read = FALSE")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
