//! Admin notification feed entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nefol_core::{NotificationId, NotificationPriority};

/// A notification shown in the admin panel.
#[derive(Debug, Clone, Serialize)]
pub struct AdminNotification {
    pub id: NotificationId,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub priority: NotificationPriority,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A notification to insert.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub priority: NotificationPriority,
    pub metadata: serde_json::Value,
}
