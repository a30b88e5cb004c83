//! Shipment creation for orders.
//!
//! Creating a shipment is a short sequence: create the ad-hoc order, resolve
//! the shipment id, store it, then assign an AWB and generate a label. Only
//! the first step's failure is returned; AWB and label failures are logged
//! and leave the shipment in `created` for a later `POST /awb`.

use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use nefol_core::{OrderId, ShipmentStatus};

use super::payload::{
    adhoc_order, awb_code, courier_name, label_url, listed_shipment_id, order_id, shiprocket_order_id,
    shipment_id, suggested_pickup_location,
};
use super::{ShiprocketClient, ShiprocketError};
use crate::db::ShipmentRepository;
use crate::models::order::Order;
use crate::models::shipment::{Shipment, ShipmentUpsert};

/// Result of creating a shipment.
#[derive(Debug, Clone)]
pub struct ShipmentOutcome {
    /// The stored shipment after AWB assignment (if it succeeded).
    pub shipment: Shipment,
    /// Shiprocket's ad-hoc create response.
    pub response: Value,
}

/// What automatic shipment creation did for a new order.
#[derive(Debug, Clone)]
pub enum AutoShipment {
    Created(Box<Shipment>),
    Skipped(&'static str),
}

/// Create the Shiprocket shipment for an order.
///
/// # Errors
///
/// Returns `ShiprocketError` if the ad-hoc order cannot be created (after one
/// retry with the pickup location Shiprocket suggests) or the shipment cannot
/// be stored.
#[instrument(skip(client, pool, order), fields(order_number = %order.order_number))]
pub async fn create_shipment(
    client: &ShiprocketClient,
    pool: &PgPool,
    order: &Order,
) -> Result<ShipmentOutcome, ShiprocketError> {
    let pickup = client.pickup_location().await;
    let mut payload = adhoc_order(order, &pickup);

    let response = match client.create_adhoc(&payload).await {
        Ok(response) => response,
        Err(e) if e.is_pickup_location_error() => {
            let suggested = suggested_pickup_location(e.body());
            warn!(error = %e, pickup = %suggested, "Pickup location rejected, retrying");
            payload["pickup_location"] = Value::String(suggested);
            client.create_adhoc(&payload).await?
        }
        Err(e) => return Err(e),
    };

    let mut remote_shipment_id = shipment_id(&response);
    if remote_shipment_id.is_none() {
        remote_shipment_id = match client.orders_by_channel_id(&shiprocket_order_id(order)).await {
            Ok(listing) => listed_shipment_id(&listing),
            Err(e) => {
                warn!(error = %e, "Failed to look up shipment id");
                None
            }
        };
    }

    let repo = ShipmentRepository::new(pool);
    let mut shipment = repo
        .upsert(
            order.id,
            &ShipmentUpsert {
                shiprocket_order_id: order_id(&response),
                shipment_id: remote_shipment_id,
                awb_code: awb_code(&response),
                courier_name: None,
                label_url: label_url(&response),
                tracking_url: None,
                status: ShipmentStatus::Created,
                payload: payload.clone(),
            },
        )
        .await?;

    info!(
        shipment_id = shipment.shipment_id.as_deref().unwrap_or("unknown"),
        "Shiprocket shipment created"
    );

    if shipment.awb_code.is_none()
        && let Some(remote_id) = shipment.shipment_id.clone()
    {
        match assign_awb_and_label(client, pool, order.id, &remote_id).await {
            Ok(updated) => shipment = updated,
            Err(e) => warn!(error = %e, "AWB assignment failed"),
        }
    }

    Ok(ShipmentOutcome { shipment, response })
}

/// Assign an AWB and generate a label for an existing shipment.
///
/// A label failure is logged and the AWB is still stored.
///
/// # Errors
///
/// Returns `ShiprocketError::NotFound` when Shiprocket assigns no AWB, or
/// any error from the assignment request or the database.
#[instrument(skip(client, pool))]
pub async fn assign_awb_and_label(
    client: &ShiprocketClient,
    pool: &PgPool,
    order_id: OrderId,
    remote_shipment_id: &str,
) -> Result<Shipment, ShiprocketError> {
    let assigned = client.assign_awb(remote_shipment_id).await?;
    let awb = awb_code(&assigned).ok_or_else(|| ShiprocketError::NotFound("AWB code in response".to_string()))?;
    let courier = courier_name(&assigned);

    let label = match client.generate_label(remote_shipment_id).await {
        Ok(body) => label_url(&body),
        Err(e) => {
            warn!(error = %e, "Label generation failed");
            None
        }
    };

    let shipment = ShipmentRepository::new(pool)
        .set_awb(order_id, &awb, courier.as_deref(), label.as_deref())
        .await?;

    info!(awb = %awb, "AWB assigned");
    Ok(shipment)
}

/// AWB and label for the stored shipment of an order.
///
/// # Errors
///
/// Returns `ShiprocketError::NotFound` when the order has no shipment id.
pub async fn awb_and_label(
    client: &ShiprocketClient,
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Shipment, ShiprocketError> {
    let remote_id = ShipmentRepository::new(pool)
        .for_order(order_id)
        .await?
        .and_then(|s| s.shipment_id)
        .ok_or_else(|| ShiprocketError::NotFound("Shipment".to_string()))?;

    assign_awb_and_label(client, pool, order_id, &remote_id).await
}

/// Create a shipment for a new order when it is ready for one.
///
/// Skips orders without a complete address and orders that already have a
/// shipment.
///
/// # Errors
///
/// Returns `ShiprocketError` if creation fails.
pub async fn auto_create(
    client: &ShiprocketClient,
    pool: &PgPool,
    order: &Order,
) -> Result<AutoShipment, ShiprocketError> {
    if !order.shipping_address.is_complete() {
        return Ok(AutoShipment::Skipped("shipping address incomplete"));
    }

    let existing = ShipmentRepository::new(pool).for_order(order.id).await?;
    if existing.is_some_and(|s| s.shipment_id.is_some()) {
        return Ok(AutoShipment::Skipped("shipment already exists"));
    }

    let outcome = create_shipment(client, pool, order).await?;
    Ok(AutoShipment::Created(Box::new(outcome.shipment)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::models::order::Address;
    use nefol_core::{OrderStatus, PaymentStatus};

    #[tokio::test]
    async fn test_auto_create_skips_incomplete_address() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/nefol_test")
            .unwrap();
        let client = ShiprocketClient::new("https://apiv2.shiprocket.in/v1/external", pool.clone());

        let order = Order {
            id: OrderId::new(1),
            order_number: "N-091206251001".to_string(),
            invoice_number: None,
            customer_name: "Asha".to_string(),
            customer_email: "asha@example.com".to_string(),
            shipping_address: Address::from_value(json!({"city": "Lucknow"})).unwrap(),
            billing_address: None,
            items: vec![],
            subtotal: Decimal::ZERO,
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            discount_code: None,
            discount_amount: Decimal::ZERO,
            coins_used: 0,
            payment_method: None,
            payment_type: None,
            payment_status: PaymentStatus::Unpaid,
            cod: false,
            status: OrderStatus::Pending,
            tags: vec![],
            affiliate_id: None,
            tracking_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let outcome = auto_create(&client, &pool, &order).await.unwrap();
        assert!(matches!(outcome, AutoShipment::Skipped("shipping address incomplete")));
    }
}
