//! Shiprocket logistics API client.
//!
//! Creates shipments for NEFOL orders, assigns AWB numbers, generates labels
//! and tracks parcels through Shiprocket's REST API.
//!
//! # Architecture
//!
//! - Email/password from the active `shiprocket_config` row → bearer token
//! - Tokens cached in memory for nine days (Shiprocket issues ten-day tokens)
//! - Pickup location cached with `moka`
//! - Responses are loosely shaped JSON read with small extractors
//!
//! The integration is optional: without credentials the order flow works
//! normally and shipment endpoints answer with `NotConfigured`.

pub mod auth;
pub mod client;
pub mod fulfillment;
pub mod payload;

pub use client::ShiprocketClient;
pub use fulfillment::{AutoShipment, ShipmentOutcome, auto_create, awb_and_label, create_shipment};

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur when interacting with the Shiprocket API.
#[derive(Debug, Error)]
pub enum ShiprocketError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shiprocket.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed (invalid email/password).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Shiprocket rejected the cached token.
    #[error("Access token expired")]
    TokenExpired,

    /// Shiprocket answered with a non-success status.
    #[error("Shiprocket API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: serde_json::Value,
    },

    /// No active credentials are stored.
    #[error("Shiprocket is not configured")]
    NotConfigured,

    /// Database error while reading credentials or storing shipments.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

impl ShiprocketError {
    /// Whether Shiprocket complained about the pickup location.
    #[must_use]
    pub fn is_pickup_location_error(&self) -> bool {
        matches!(self, Self::Api { message, .. } if message.to_ascii_lowercase().contains("pickup"))
    }

    /// Response body of an API error, `Null` for every other kind.
    #[must_use]
    pub fn body(&self) -> &serde_json::Value {
        match self {
            Self::Api { body, .. } => body,
            _ => &serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shiprocket_error_display() {
        let err = ShiprocketError::NotFound("shipment".to_string());
        assert_eq!(err.to_string(), "Not found: shipment");

        let err = ShiprocketError::Api {
            status: 422,
            message: "Invalid pincode".to_string(),
            body: serde_json::Value::Null,
        };
        assert_eq!(err.to_string(), "Shiprocket API error (422): Invalid pincode");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShiprocketError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_pickup_location_error_detection() {
        let err = ShiprocketError::Api {
            status: 422,
            message: "Wrong Pickup location entered.".to_string(),
            body: serde_json::json!({"data": [{"pickup_location": "Warehouse"}]}),
        };
        assert!(err.is_pickup_location_error());
        assert_eq!(err.body()["data"][0]["pickup_location"], "Warehouse");

        let err = ShiprocketError::Api {
            status: 422,
            message: "Invalid pincode".to_string(),
            body: serde_json::Value::Null,
        };
        assert!(!err.is_pickup_location_error());
        assert!(!ShiprocketError::TokenExpired.is_pickup_location_error());
    }
}
