//! Status enums for orders, payments and shipments.
//!
//! All statuses are stored as lowercase `TEXT` columns and travel over the
//! wire in the same `snake_case` spelling, so `Display` and `FromStr` agree
//! with serde.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidStatus {
    kind: &'static str,
    value: String,
}

impl InvalidStatus {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in lifecycle order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The database / wire spelling.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(InvalidStatus::new($kind, s)),
                }
            }
        }
    };
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    /// Returned to origin by the courier.
    Rto,
    Returned,
}

text_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Rto => "rto",
    Returned => "returned",
});

impl OrderStatus {
    /// Whether moving into this status sends the customer an email and a
    /// WhatsApp message.
    #[must_use]
    pub const fn is_customer_notifiable(&self) -> bool {
        matches!(self, Self::Shipped | Self::OutForDelivery | Self::Delivered)
    }

    /// Whether the order is in transit to the customer.
    #[must_use]
    pub const fn is_in_transit(&self) -> bool {
        matches!(self, Self::Shipped | Self::OutForDelivery)
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Status of a Shiprocket shipment as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    Pending,
    Created,
    ReadyToShip,
    InTransit,
    Delivered,
    Cancelled,
    Rto,
}

text_enum!(ShipmentStatus, "shipment status", {
    Pending => "pending",
    Created => "created",
    ReadyToShip => "ready_to_ship",
    InTransit => "in_transit",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Rto => "rto",
});

/// Status of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(CancellationStatus, "cancellation status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Priority of an admin notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

text_enum!(NotificationPriority, "notification priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trips_through_text() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_order_status_parse_is_lenient_on_case() {
        assert_eq!(
            " Out_For_Delivery ".parse::<OrderStatus>().unwrap(),
            OrderStatus::OutForDelivery
        );
    }

    #[test]
    fn test_order_status_serde_matches_display() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        assert_eq!(OrderStatus::OutForDelivery.to_string(), "out_for_delivery");
    }

    #[test]
    fn test_customer_notifiable_statuses() {
        let notifiable: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.is_customer_notifiable())
            .collect();
        assert_eq!(
            notifiable,
            [
                &OrderStatus::Shipped,
                &OrderStatus::OutForDelivery,
                &OrderStatus::Delivered
            ]
        );
    }

    #[test]
    fn test_invalid_status_message() {
        let err = "lost".parse::<ShipmentStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid shipment status: lost");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Unpaid);
        assert_eq!(ShipmentStatus::default(), ShipmentStatus::Pending);
        assert_eq!(NotificationPriority::default(), NotificationPriority::Medium);
    }
}
