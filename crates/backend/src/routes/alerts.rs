//! Alert configuration, test sends and the admin notification feed.

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use nefol_core::{NotificationId, Permission};

use crate::db::{NotificationRepository, OrderRepository};
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{RequireStaff, require_permission};
use crate::models::AdminNotification;
use crate::services::alerts::{self, AlertConfig, AlertDelivery};
use crate::services::orders::OrderError;
use crate::state::AppState;

/// Notifications returned by one listing.
const NOTIFICATION_LIST_LIMIT: i64 = 100;

/// Build the alerts and notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts/config", get(get_config).post(save_config))
        .route("/api/alerts/test/whatsapp", post(test_whatsapp))
        .route("/api/alerts/test/email", post(test_email))
        .route("/api/notifications/order", post(order_alert))
        .route("/api/admin/notifications", get(list_notifications))
        .route("/api/admin/notifications/unread-count", get(unread_count))
        .route("/api/admin/notifications/{id}/read", put(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct TestWhatsAppRequest {
    pub phone_number: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderAlertRequest {
    pub order_id: Option<Value>,
    pub order_number: Option<String>,
}

impl OrderAlertRequest {
    /// The order number or numeric id to look up.
    fn lookup_key(&self) -> Option<String> {
        let from_id = match &self.order_id {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.trim().to_string()),
            _ => None,
        };
        self.order_number
            .as_deref()
            .map(str::trim)
            .map(String::from)
            .into_iter()
            .chain(from_id)
            .find(|k| !k.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct OrderAlertResponse {
    pub order_number: String,
    #[serde(flatten)]
    pub delivered: AlertDelivery,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Alert configuration
// =============================================================================

async fn get_config(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<AlertConfig>, AppError> {
    require_permission(&staff, Permission::UsersRead)?;
    Ok(Json(AlertConfig::load(state.pool()).await?.masked()))
}

/// Save the configuration; masked secrets posted back keep the stored values.
#[instrument(skip_all)]
async fn save_config(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Json(incoming): Json<AlertConfig>,
) -> Result<Json<AlertConfig>, AppError> {
    require_permission(&staff, Permission::UsersUpdate)?;
    let saved = AlertConfig::save(state.pool(), incoming).await?;
    Ok(Json(saved.masked()))
}

#[instrument(skip_all)]
async fn test_whatsapp(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Json(request): Json<TestWhatsAppRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::UsersUpdate)?;
    let phone = present(request.phone_number.as_deref())
        .ok_or_else(|| AppError::BadRequest("phone_number is required".to_string()))?;
    let message = present(request.message.as_deref()).unwrap_or("Test message from NEFOL");

    let message_id = alerts::send_test_whatsapp(state.pool(), state.config(), phone, message).await?;
    Ok(Json(json!({ "ok": true, "message_id": message_id })))
}

#[instrument(skip_all)]
async fn test_email(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Json(request): Json<TestEmailRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::UsersUpdate)?;
    let to = present(request.to.as_deref())
        .ok_or_else(|| AppError::BadRequest("to is required".to_string()))?;
    let subject = present(request.subject.as_deref()).unwrap_or("NEFOL test email");
    let text = present(request.text.as_deref()).unwrap_or("This is a test email from NEFOL.");

    alerts::send_test_email(state.pool(), state.config(), to, subject, text).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Send the admin alert for one order over every configured channel.
#[instrument(skip_all)]
async fn order_alert(
    State(state): State<AppState>,
    Json(request): Json<OrderAlertRequest>,
) -> Result<Json<OrderAlertResponse>, AppError> {
    let key = request
        .lookup_key()
        .ok_or_else(|| AppError::BadRequest("order_id or order_number is required".to_string()))?;

    let order = OrderRepository::new(state.pool())
        .find(&key)
        .await?
        .ok_or(OrderError::NotFound)?;
    let delivered = alerts::send_order_alert(state.pool(), state.config(), &order).await?;

    Ok(Json(OrderAlertResponse {
        order_number: order.order_number,
        delivered,
    }))
}

// =============================================================================
// Admin notification feed
// =============================================================================

async fn list_notifications(
    RequireStaff { .. }: RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<AdminNotification>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(NOTIFICATION_LIST_LIMIT)
        .clamp(1, NOTIFICATION_LIST_LIMIT);
    let items = NotificationRepository::new(state.pool())
        .list(query.unread_only, limit)
        .await?;
    Ok(Json(items))
}

async fn unread_count(
    RequireStaff { .. }: RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let count = NotificationRepository::new(state.pool()).unread_count().await?;
    Ok(Json(json!({ "count": count })))
}

async fn mark_read(
    RequireStaff { .. }: RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<AdminNotification>, AppError> {
    Ok(Json(NotificationRepository::new(state.pool()).mark_read(id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(body: &str) -> OrderAlertRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_lookup_key_prefers_order_number() {
        let r = request(r#"{"order_id": 12, "order_number": "N-090101251001"}"#);
        assert_eq!(r.lookup_key().as_deref(), Some("N-090101251001"));
    }

    #[test]
    fn test_lookup_key_accepts_numeric_or_string_id() {
        assert_eq!(request(r#"{"order_id": 12}"#).lookup_key().as_deref(), Some("12"));
        assert_eq!(request(r#"{"order_id": " 12 "}"#).lookup_key().as_deref(), Some("12"));
        assert_eq!(
            request(r#"{"order_id": 12, "order_number": " "}"#).lookup_key().as_deref(),
            Some("12")
        );
        assert!(request(r#"{"order_id": null}"#).lookup_key().is_none());
    }
}
