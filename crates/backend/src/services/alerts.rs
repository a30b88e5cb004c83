//! Admin alerts: stored channel settings, new-order alerts and test sends.
//!
//! The `alert_config` setting overrides the SMTP and WhatsApp settings from
//! the environment. Secrets are never returned to the admin panel; they come
//! back as `********`, and posting that mask back keeps the stored value.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nefol_core::{NotificationPriority, format_inr};

use crate::config::{BackendConfig, EmailConfig, WhatsAppConfig};
use crate::db::{NotificationRepository, RepositoryError, SettingsRepository};
use crate::models::order::Order;
use crate::models::{AdminNotification, NewNotification};
use crate::services::email::{EmailError, EmailService};
use crate::services::whatsapp::{WhatsAppClient, WhatsAppError};

/// Settings key holding the alert configuration.
pub const ALERT_CONFIG_KEY: &str = "alert_config";

/// Placeholder returned in place of stored secrets.
pub const MASK: &str = "********";

const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_WHATSAPP_API_VERSION: &str = "v19.0";

/// Errors from alert delivery.
#[derive(Debug, Error)]
pub enum AlertError {
    /// A channel has no usable settings.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    WhatsApp(#[from] WhatsAppError),

    #[error(transparent)]
    Database(#[from] RepositoryError),
}

// =============================================================================
// Stored configuration
// =============================================================================

/// Alert channel settings as stored under `alert_config`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub whatsapp_token: Option<String>,
    pub whatsapp_phone_id: Option<String>,
    pub notify_phone: Option<String>,
    pub smtp_provider: Option<String>,
    pub smtp_host: Option<String>,
    #[serde(deserialize_with = "lenient_port")]
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub notify_email: Option<String>,
    pub from_email: Option<String>,
}

impl std::fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertConfig")
            .field("whatsapp_token", &self.whatsapp_token.as_ref().map(|_| "[REDACTED]"))
            .field("whatsapp_phone_id", &self.whatsapp_phone_id)
            .field("notify_phone", &self.notify_phone)
            .field("smtp_provider", &self.smtp_provider)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &self.smtp_pass.as_ref().map(|_| "[REDACTED]"))
            .field("notify_email", &self.notify_email)
            .field("from_email", &self.from_email)
            .finish()
    }
}

/// Accept the port as a number, a numeric string, or blank.
fn lenient_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Trimmed non-empty text.
fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Default SMTP host for a named provider.
fn provider_host(provider: &str) -> Option<&'static str> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "gmail" => Some("smtp.gmail.com"),
        "hostinger" => Some("smtp.hostinger.com"),
        "outlook" | "office365" => Some("smtp.office365.com"),
        "zoho" => Some("smtp.zoho.in"),
        _ => None,
    }
}

impl AlertConfig {
    /// Copy with secrets replaced by [`MASK`].
    #[must_use]
    pub fn masked(&self) -> Self {
        let mask = |s: &Option<String>| present(s.as_ref()).map(|_| MASK.to_string());
        Self {
            whatsapp_token: mask(&self.whatsapp_token),
            smtp_pass: mask(&self.smtp_pass),
            ..self.clone()
        }
    }

    /// Apply an update from the admin panel. Masked secrets keep the stored
    /// value.
    #[must_use]
    pub fn merged(self, mut incoming: Self) -> Self {
        if incoming.whatsapp_token.as_deref() == Some(MASK) {
            incoming.whatsapp_token = self.whatsapp_token;
        }
        if incoming.smtp_pass.as_deref() == Some(MASK) {
            incoming.smtp_pass = self.smtp_pass;
        }
        incoming
    }

    /// SMTP settings, falling back to the environment's.
    #[must_use]
    pub fn email_config(&self, fallback: Option<&EmailConfig>) -> Option<EmailConfig> {
        let (Some(user), Some(pass)) = (present(self.smtp_user.as_ref()), present(self.smtp_pass.as_ref())) else {
            return fallback.cloned();
        };

        let host = present(self.smtp_host.as_ref())
            .or_else(|| self.smtp_provider.as_deref().and_then(provider_host))
            .map(str::to_string)
            .or_else(|| fallback.map(|f| f.smtp_host.clone()))?;
        let admin_address = present(self.notify_email.as_ref())
            .map(str::to_string)
            .or_else(|| fallback.map(|f| f.admin_address.clone()))
            .unwrap_or_else(|| user.to_string());

        Some(EmailConfig {
            smtp_host: host,
            smtp_port: self.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            smtp_username: user.to_string(),
            smtp_password: SecretString::from(pass.to_string()),
            from_address: present(self.from_email.as_ref()).unwrap_or(user).to_string(),
            admin_address,
        })
    }

    /// WhatsApp settings, falling back to the environment's.
    #[must_use]
    pub fn whatsapp_config(&self, fallback: Option<&WhatsAppConfig>) -> Option<WhatsAppConfig> {
        match (present(self.whatsapp_token.as_ref()), present(self.whatsapp_phone_id.as_ref())) {
            (Some(token), Some(phone_id)) => Some(WhatsAppConfig {
                access_token: SecretString::from(token.to_string()),
                phone_number_id: phone_id.to_string(),
                api_version: fallback.map_or_else(
                    || DEFAULT_WHATSAPP_API_VERSION.to_string(),
                    |f| f.api_version.clone(),
                ),
            }),
            _ => fallback.cloned(),
        }
    }

    /// Load the stored configuration, empty when unset.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the setting cannot be read.
    pub async fn load(pool: &PgPool) -> Result<Self, RepositoryError> {
        Ok(SettingsRepository::new(pool)
            .get_typed::<Self>(ALERT_CONFIG_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Merge `incoming` over the stored configuration and save it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the setting cannot be read or written.
    pub async fn save(pool: &PgPool, incoming: Self) -> Result<Self, RepositoryError> {
        let merged = Self::load(pool).await?.merged(incoming);
        SettingsRepository::new(pool)
            .set_typed(ALERT_CONFIG_KEY, &merged)
            .await?;
        tracing::info!("Alert configuration saved");
        Ok(merged)
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Which channels delivered an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertDelivery {
    pub email: bool,
    pub whatsapp: bool,
}

/// Text of the admin alert for a new order.
#[must_use]
pub fn order_alert_text(order: &Order) -> String {
    let items: i64 = order.items.iter().map(|i| i.quantity()).sum();
    format!(
        "New order {} from {} ({}). Items: {items}. Payment: {}.",
        order.order_number,
        order.customer_name,
        format_inr(order.total),
        if order.is_cod() { "COD" } else { "Prepaid" },
    )
}

/// Send the new-order alert to the admin over every configured channel.
///
/// Channel failures are logged and reported as `false`.
///
/// # Errors
///
/// Returns `RepositoryError` if the stored configuration cannot be read.
#[instrument(skip(pool, config, order), fields(order_number = %order.order_number))]
pub async fn send_order_alert(
    pool: &PgPool,
    config: &BackendConfig,
    order: &Order,
) -> Result<AlertDelivery, RepositoryError> {
    let alerts = AlertConfig::load(pool).await?;
    let text = order_alert_text(order);
    let subject = format!("New Order {} - {}", order.order_number, order.customer_name);
    let mut delivery = AlertDelivery::default();

    if let Some(email_config) = alerts.email_config(config.email.as_ref()) {
        let to = email_config.admin_address.clone();
        let sent = match EmailService::new(&email_config) {
            Ok(service) => service.send_plain(&to, &subject, &text).await,
            Err(e) => Err(EmailError::from(e)),
        };
        match sent {
            Ok(()) => delivery.email = true,
            Err(e) => tracing::warn!(error = %e, "Admin email alert failed"),
        }
    }

    let phone = present(alerts.notify_phone.as_ref());
    if let (Some(phone), Some(wa_config)) = (phone, alerts.whatsapp_config(config.whatsapp.as_ref())) {
        let sent = match WhatsAppClient::new(&wa_config) {
            Ok(client) => client.send_text(phone, &text).await.map(|_| ()),
            Err(e) => Err(e),
        };
        match sent {
            Ok(()) => delivery.whatsapp = true,
            Err(e) => tracing::warn!(error = %e, "Admin WhatsApp alert failed"),
        }
    }

    Ok(delivery)
}

/// Send a test WhatsApp text using the effective settings.
///
/// # Errors
///
/// Returns `AlertError::NotConfigured` without WhatsApp settings, or the
/// provider error.
#[instrument(skip(pool, config, message))]
pub async fn send_test_whatsapp(
    pool: &PgPool,
    config: &BackendConfig,
    phone: &str,
    message: &str,
) -> Result<Option<String>, AlertError> {
    let alerts = AlertConfig::load(pool).await?;
    let wa_config = alerts
        .whatsapp_config(config.whatsapp.as_ref())
        .ok_or(AlertError::NotConfigured("WhatsApp"))?;
    let sent = WhatsAppClient::new(&wa_config)?.send_text(phone, message).await?;
    Ok(sent.message_id().map(str::to_string))
}

/// Send a test email using the effective SMTP settings.
///
/// # Errors
///
/// Returns `AlertError::NotConfigured` without SMTP settings, or the
/// delivery error.
#[instrument(skip(pool, config, text))]
pub async fn send_test_email(
    pool: &PgPool,
    config: &BackendConfig,
    to: &str,
    subject: &str,
    text: &str,
) -> Result<(), AlertError> {
    let alerts = AlertConfig::load(pool).await?;
    let email_config = alerts
        .email_config(config.email.as_ref())
        .ok_or(AlertError::NotConfigured("Email"))?;
    let service = EmailService::new(&email_config).map_err(EmailError::from)?;
    service.send_plain(to, subject, text).await?;
    Ok(())
}

// =============================================================================
// Admin notification feed
// =============================================================================

/// Feed entry for a newly placed order.
#[must_use]
pub fn new_order_notification(order: &Order) -> NewNotification {
    NewNotification {
        notification_type: "order".to_string(),
        title: "New Order Received".to_string(),
        message: format!(
            "Order {} from {} (₹{})",
            order.order_number,
            order.customer_name,
            order.total.round_dp(2)
        ),
        link: Some("/admin/orders".to_string()),
        icon: Some("shopping-cart".to_string()),
        priority: NotificationPriority::High,
        metadata: json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "customer_name": order.customer_name,
            "customer_email": order.customer_email,
            "total": order.total,
        }),
    }
}

/// Record a new-order entry in the admin feed.
///
/// # Errors
///
/// Returns `RepositoryError` if the insert fails.
pub async fn record_new_order(pool: &PgPool, order: &Order) -> Result<AdminNotification, RepositoryError> {
    NotificationRepository::new(pool)
        .create(&new_order_notification(order))
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored() -> AlertConfig {
        AlertConfig {
            whatsapp_token: Some("EAAG-real-token".to_string()),
            whatsapp_phone_id: Some("1098".to_string()),
            notify_phone: Some("9876543210".to_string()),
            smtp_provider: Some("gmail".to_string()),
            smtp_user: Some("alerts@thenefol.com".to_string()),
            smtp_pass: Some("app-password".to_string()),
            notify_email: Some("ops@thenefol.com".to_string()),
            ..AlertConfig::default()
        }
    }

    #[test]
    fn test_masked_hides_secrets_only() {
        let masked = stored().masked();
        assert_eq!(masked.whatsapp_token.as_deref(), Some(MASK));
        assert_eq!(masked.smtp_pass.as_deref(), Some(MASK));
        assert_eq!(masked.smtp_user.as_deref(), Some("alerts@thenefol.com"));

        let empty = AlertConfig::default().masked();
        assert_eq!(empty.whatsapp_token, None);
    }

    #[test]
    fn test_masked_value_keeps_stored_secret() {
        let incoming = AlertConfig {
            smtp_user: Some("new@thenefol.com".to_string()),
            ..stored().masked()
        };
        let merged = stored().merged(incoming);
        assert_eq!(merged.smtp_pass.as_deref(), Some("app-password"));
        assert_eq!(merged.whatsapp_token.as_deref(), Some("EAAG-real-token"));
        assert_eq!(merged.smtp_user.as_deref(), Some("new@thenefol.com"));
    }

    #[test]
    fn test_new_secret_replaces_stored() {
        let incoming = AlertConfig {
            smtp_pass: Some("rotated".to_string()),
            ..stored()
        };
        assert_eq!(stored().merged(incoming).smtp_pass.as_deref(), Some("rotated"));
    }

    #[test]
    fn test_port_accepts_strings_and_numbers() {
        let config: AlertConfig = serde_json::from_value(json!({"smtp_port": "587"})).unwrap();
        assert_eq!(config.smtp_port, Some(587));
        let config: AlertConfig = serde_json::from_value(json!({"smtp_port": 465})).unwrap();
        assert_eq!(config.smtp_port, Some(465));
        let config: AlertConfig = serde_json::from_value(json!({"smtp_port": ""})).unwrap();
        assert_eq!(config.smtp_port, None);
    }

    #[test]
    fn test_email_config_uses_provider_host() {
        let config = stored().email_config(None).unwrap();
        assert_eq!(config.smtp_host, "smtp.gmail.com");
        assert_eq!(config.smtp_port, 465);
        assert_eq!(config.from_address, "alerts@thenefol.com");
        assert_eq!(config.admin_address, "ops@thenefol.com");
    }

    #[test]
    fn test_email_config_falls_back_without_credentials() {
        assert!(AlertConfig::default().email_config(None).is_none());
    }

    #[test]
    fn test_whatsapp_config_from_stored_values() {
        let config = stored().whatsapp_config(None).unwrap();
        assert_eq!(config.phone_number_id, "1098");
        assert_eq!(config.api_version, "v19.0");
        assert!(AlertConfig::default().whatsapp_config(None).is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", stored());
        assert!(!debug.contains("app-password"));
        assert!(!debug.contains("EAAG-real-token"));
    }
}
