//! WhatsApp Cloud API client for customer and admin messages.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://graph.facebook.com/{version}/{phone_id}/messages`
//! - Authentication: `Authorization: Bearer <system user token>`
//!
//! Template messages need an approved template on the Meta business
//! account. When Meta rejects a template (error codes 132000-132999) the
//! same content is sent as plain text instead.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use crate::config::WhatsAppConfig;

/// Graph API root.
const GRAPH_BASE_URL: &str = "https://graph.facebook.com";

/// Template for shipped orders: name, order number, tracking link.
pub const TEMPLATE_ORDER_SHIPPED: &str = "nefol_order_shipped";

/// Template for delivered orders: name, order number.
pub const TEMPLATE_ORDER_DELIVERED: &str = "nefol_order_delivered";

/// Template language code.
const TEMPLATE_LANGUAGE: &str = "en";

/// Meta's error code range for template problems.
const TEMPLATE_ERROR_CODES: std::ops::RangeInclusive<i64> = 132_000..=132_999;

/// Errors that can occur when sending WhatsApp messages.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Meta returned an error response.
    #[error("WhatsApp API error {code}: {message}")]
    Api { status: u16, code: i64, message: String },

    /// Unauthorized (invalid or expired token).
    #[error("Unauthorized: invalid WhatsApp access token")]
    Unauthorized,

    /// Recipient number could not be normalised.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    /// Failed to build the client or parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WhatsAppError {
    /// Whether Meta rejected the template itself rather than the request.
    #[must_use]
    pub fn is_template_error(&self) -> bool {
        matches!(self, Self::Api { code, .. } if TEMPLATE_ERROR_CODES.contains(code))
    }
}

/// Normalise a phone number for the Cloud API.
///
/// Keeps digits only; a bare 10-digit Indian number gets the `91` country
/// code. Returns `None` when no digits remain.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => None,
        10 => Some(format!("91{digits}")),
        _ => Some(digits),
    }
}

/// Successful send response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

/// Identifier Meta assigned to a sent message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentMessage {
    pub id: String,
}

impl SendResponse {
    /// The first message id, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

/// WhatsApp Cloud API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    inner: Arc<WhatsAppClientInner>,
}

struct WhatsAppClientInner {
    client: reqwest::Client,
    messages_url: String,
    phone_number_id: String,
}

impl WhatsAppClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, WhatsAppError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.access_token.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| WhatsAppError::Parse(format!("Invalid access token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(WhatsAppClientInner {
                client,
                messages_url: format!(
                    "{GRAPH_BASE_URL}/{}/{}/messages",
                    config.api_version, config.phone_number_id
                ),
                phone_number_id: config.phone_number_id.clone(),
            }),
        })
    }

    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Returns error if the number is invalid or Meta rejects the message.
    #[instrument(skip(self, body))]
    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendResponse, WhatsAppError> {
        let to = normalize_phone(to).ok_or_else(|| WhatsAppError::InvalidPhone(to.to_string()))?;
        self.send(&text_payload(&to, body)).await
    }

    /// Send an approved template with positional body parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the number is invalid or Meta rejects the message.
    #[instrument(skip(self, parameters))]
    pub async fn send_template(
        &self,
        to: &str,
        template: &str,
        parameters: &[&str],
    ) -> Result<SendResponse, WhatsAppError> {
        let to = normalize_phone(to).ok_or_else(|| WhatsAppError::InvalidPhone(to.to_string()))?;
        self.send(&template_payload(&to, template, parameters)).await
    }

    /// Send a template, falling back to `fallback_text` when Meta rejects the
    /// template.
    ///
    /// # Errors
    ///
    /// Returns error if both the template and the text message fail.
    pub async fn send_template_or_text(
        &self,
        to: &str,
        template: &str,
        parameters: &[&str],
        fallback_text: &str,
    ) -> Result<SendResponse, WhatsAppError> {
        match self.send_template(to, template, parameters).await {
            Err(e) if e.is_template_error() => {
                tracing::warn!(template = %template, error = %e, "Template rejected, sending text instead");
                self.send_text(to, fallback_text).await
            }
            other => other,
        }
    }

    /// Tell a customer their order has shipped.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be sent.
    pub async fn send_order_shipped(
        &self,
        to: &str,
        name: &str,
        order_number: &str,
        tracking_url: Option<&str>,
    ) -> Result<SendResponse, WhatsAppError> {
        let tracking = tracking_url.unwrap_or("Tracking details will be shared soon");
        let text = format!(
            "Hi {name}, your NEFOL order {order_number} has been shipped! Track it here: {tracking}"
        );
        self.send_template_or_text(to, TEMPLATE_ORDER_SHIPPED, &[name, order_number, tracking], &text)
            .await
    }

    /// Tell a customer their order was delivered.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be sent.
    pub async fn send_order_delivered(
        &self,
        to: &str,
        name: &str,
        order_number: &str,
    ) -> Result<SendResponse, WhatsAppError> {
        let text = format!(
            "Hi {name}, your NEFOL order {order_number} has been delivered. We hope you love it!"
        );
        self.send_template_or_text(to, TEMPLATE_ORDER_DELIVERED, &[name, order_number], &text)
            .await
    }

    async fn send(&self, payload: &Value) -> Result<SendResponse, WhatsAppError> {
        let response = self
            .inner
            .client
            .post(&self.inner.messages_url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let sent: SendResponse = response
                .json()
                .await
                .map_err(|e| WhatsAppError::Parse(format!("Failed to parse response: {e}")))?;
            tracing::info!(message_id = ?sent.message_id(), "WhatsApp message sent");
            return Ok(sent);
        }

        let status = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(parse_error(status, &body))
    }
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("phone_number_id", &self.inner.phone_number_id)
            .finish_non_exhaustive()
    }
}

fn text_payload(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "preview_url": false, "body": body },
    })
}

fn template_payload(to: &str, template: &str, parameters: &[&str]) -> Value {
    let parameters: Vec<Value> = parameters
        .iter()
        .map(|p| json!({ "type": "text", "text": p }))
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "template",
        "template": {
            "name": template,
            "language": { "code": TEMPLATE_LANGUAGE },
            "components": [{ "type": "body", "parameters": parameters }],
        },
    })
}

fn parse_error(status: u16, body: &str) -> WhatsAppError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if status == 401 && envelope.error.code == 190 => WhatsAppError::Unauthorized,
        Ok(envelope) => WhatsAppError::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) if status == 401 => WhatsAppError::Unauthorized,
        Err(_) => WhatsAppError::Api {
            status,
            code: 0,
            message: body.chars().take(200).collect(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("98765 43210").as_deref(), Some("919876543210"));
        assert_eq!(normalize_phone("+91-98765-43210").as_deref(), Some("919876543210"));
        assert_eq!(normalize_phone("447911123456").as_deref(), Some("447911123456"));
        assert_eq!(normalize_phone(" - "), None);
    }

    #[test]
    fn test_template_payload_shape() {
        let payload = template_payload("919876543210", TEMPLATE_ORDER_DELIVERED, &["Meera", "N-1"]);
        assert_eq!(payload["type"], "template");
        assert_eq!(payload["template"]["name"], "nefol_order_delivered");
        let params = payload["template"]["components"][0]["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1]["text"], "N-1");
    }

    #[test]
    fn test_text_payload_shape() {
        let payload = text_payload("919876543210", "hello");
        assert_eq!(payload["text"]["body"], "hello");
        assert_eq!(payload["to"], "919876543210");
    }

    #[test]
    fn test_template_errors_are_detected() {
        let body = r#"{"error":{"message":"Template name does not exist","code":132001}}"#;
        let err = parse_error(400, body);
        assert!(err.is_template_error());

        let body = r#"{"error":{"message":"Invalid parameter","code":100}}"#;
        assert!(!parse_error(400, body).is_template_error());
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let body = r#"{"error":{"message":"Error validating access token","code":190}}"#;
        assert!(matches!(parse_error(401, body), WhatsAppError::Unauthorized));
        assert!(matches!(parse_error(401, "oops"), WhatsAppError::Unauthorized));
    }

    #[test]
    fn test_unparseable_error_body_is_kept() {
        match parse_error(500, "<html>bad gateway</html>") {
            WhatsAppError::Api { status, code, message } => {
                assert_eq!(status, 500);
                assert_eq!(code, 0);
                assert!(message.contains("bad gateway"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_client_debug_hides_token() {
        let client = WhatsAppClient::new(&WhatsAppConfig {
            access_token: secrecy::SecretString::from("EAAGm0PX4ZCpsBAsecret"),
            phone_number_id: "1234567890".to_string(),
            api_version: "v19.0".to_string(),
        })
        .unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("1234567890"));
        assert!(!debug.contains("secret"));
    }
}
