//! Locally tracked Shiprocket shipments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use nefol_core::{OrderId, ShipmentRecordId, ShipmentStatus};

/// The shipment recorded for an order.
#[derive(Debug, Clone, Serialize)]
pub struct Shipment {
    pub id: ShipmentRecordId,
    pub order_id: OrderId,
    pub shiprocket_order_id: Option<String>,
    pub shipment_id: Option<String>,
    pub awb_code: Option<String>,
    pub courier_name: Option<String>,
    pub label_url: Option<String>,
    pub tracking_url: Option<String>,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Public courier tracking link, falling back to Shiprocket's tracking page.
    #[must_use]
    pub fn public_tracking_url(&self) -> Option<String> {
        self.tracking_url.clone().or_else(|| {
            self.awb_code
                .as_ref()
                .map(|awb| format!("https://shiprocket.co/tracking/{awb}"))
        })
    }
}

/// Values to store after talking to Shiprocket.
#[derive(Debug, Clone, Default)]
pub struct ShipmentUpsert {
    pub shiprocket_order_id: Option<String>,
    pub shipment_id: Option<String>,
    pub awb_code: Option<String>,
    pub courier_name: Option<String>,
    pub label_url: Option<String>,
    pub tracking_url: Option<String>,
    pub status: ShipmentStatus,
    pub payload: serde_json::Value,
}

/// Latest shipment per order, joined with the order summary.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentSummary {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub order_number: String,
    pub customer_name: String,
    pub order_status: String,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(awb: Option<&str>, tracking: Option<&str>) -> Shipment {
        Shipment {
            id: ShipmentRecordId::new(1),
            order_id: OrderId::new(9),
            shiprocket_order_id: None,
            shipment_id: Some("123".to_string()),
            awb_code: awb.map(String::from),
            courier_name: None,
            label_url: None,
            tracking_url: tracking.map(String::from),
            status: ShipmentStatus::Created,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_public_tracking_url() {
        assert_eq!(
            shipment(Some("AWB1"), None).public_tracking_url().as_deref(),
            Some("https://shiprocket.co/tracking/AWB1")
        );
        assert_eq!(
            shipment(Some("AWB1"), Some("https://dl.example/t/1"))
                .public_tracking_url()
                .as_deref(),
            Some("https://dl.example/t/1")
        );
        assert!(shipment(None, None).public_tracking_url().is_none());
    }
}
