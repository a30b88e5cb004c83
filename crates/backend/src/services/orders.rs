//! Order workflows: checkout, admin updates, splitting and export.
//!
//! Side effects that talk to the outside world (emails, WhatsApp, Shiprocket,
//! the admin feed) are best effort. They run after the database write has
//! committed and only log when they fail.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use nefol_core::{Email, OrderId, OrderStatus, PaymentStatus, ShipmentStatus, StaffUserId};

use crate::db::orders::{SplitPlan, SplitSide};
use crate::db::{OrderRepository, RepositoryError, ShipmentRepository};
use crate::models::order::{Address, NewOrder, Order, OrderChanges, OrderItem, items_subtotal, json_decimal};
use crate::services::alerts;
use crate::services::email::{EmailError, InvoiceDocument};
use crate::services::invoice::{InvoiceError, prepare_invoice, render_html};
use crate::services::sequences::{next_invoice_number, next_order_number};
use crate::shiprocket::{self, AutoShipment};
use crate::state::AppState;

/// Default page size for order listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size a caller may ask for.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Reason recorded when an admin cancels without a note.
const DEFAULT_CANCEL_REASON: &str = "Cancelled by admin";

/// Header row of the CSV export.
pub const CSV_HEADER: &str =
    "order_number,customer_name,customer_email,status,subtotal,shipping,tax,total,created_at";

// =============================================================================
// Errors
// =============================================================================

/// Errors from order workflows.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid total amount")]
    InvalidTotal,

    #[error("Invalid {0}")]
    InvalidField(&'static str),

    #[error("No fields to update")]
    NoFieldsToUpdate,

    #[error("itemIndexes must be a non-empty array")]
    NoItemIndexes,

    #[error("No items to move")]
    NothingToMove,

    #[error("Order not found")]
    NotFound,

    #[error("Email is not configured")]
    EmailDisabled,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

// =============================================================================
// Checkout
// =============================================================================

/// Order placed by the storefront.
///
/// Amounts stay as raw JSON until validation so a string total can be
/// rejected instead of silently coerced.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub items: Option<Value>,
    pub subtotal: Option<Value>,
    pub shipping: Option<Value>,
    pub tax: Option<Value>,
    pub total: Option<Value>,
    pub payment_method: Option<String>,
    pub payment_type: Option<String>,
    pub payment_status: Option<String>,
    pub cod: Option<bool>,
    pub affiliate_id: Option<Value>,
    pub discount_code: Option<String>,
    pub discount_amount: Option<Value>,
    pub coins_used: Option<i32>,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn amount_or_zero(value: Option<&Value>) -> Decimal {
    value.and_then(json_decimal).unwrap_or_default()
}

impl CreateOrderRequest {
    /// Validate the request and turn it into an insertable order.
    ///
    /// The order number is left empty unless the storefront supplied one.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::MissingFields` when a required field is absent,
    /// `OrderError::InvalidTotal` when the total is not a non-negative
    /// number, and `OrderError::InvalidField` for a malformed email,
    /// payment status, or an item that is not a JSON object.
    pub fn into_new_order(self) -> Result<NewOrder, OrderError> {
        let customer_name = present(self.customer_name).ok_or(OrderError::MissingFields)?;
        let customer_email = present(self.customer_email).ok_or(OrderError::MissingFields)?;
        let shipping_address = self
            .shipping_address
            .and_then(Address::from_value)
            .ok_or(OrderError::MissingFields)?;
        let items: Vec<OrderItem> = match self.items {
            Some(Value::Array(items)) if !items.is_empty() => items
                .into_iter()
                .map(OrderItem::from_value)
                .collect::<Option<_>>()
                .ok_or(OrderError::InvalidField("items"))?,
            _ => return Err(OrderError::MissingFields),
        };

        let total = match self.total {
            None | Some(Value::Null) => return Err(OrderError::MissingFields),
            Some(value @ Value::Number(_)) => json_decimal(&value).ok_or(OrderError::InvalidTotal)?,
            Some(_) => return Err(OrderError::InvalidTotal),
        };
        if total < Decimal::ZERO {
            return Err(OrderError::InvalidTotal);
        }

        let email = Email::parse(&customer_email).map_err(|_| OrderError::InvalidField("customer_email"))?;
        let payment_status = match present(self.payment_status) {
            Some(raw) => raw
                .parse::<PaymentStatus>()
                .map_err(|_| OrderError::InvalidField("payment_status"))?,
            None => PaymentStatus::Unpaid,
        };

        let subtotal = self
            .subtotal
            .as_ref()
            .and_then(json_decimal)
            .unwrap_or_else(|| items_subtotal(&items));

        let affiliate_id = match self.affiliate_id {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(NewOrder {
            order_number: present(self.order_number).unwrap_or_default(),
            invoice_number: None,
            customer_name,
            customer_email: email.into_inner(),
            shipping_address,
            billing_address: self.billing_address.and_then(Address::from_value),
            items,
            subtotal,
            shipping: amount_or_zero(self.shipping.as_ref()),
            tax: amount_or_zero(self.tax.as_ref()),
            total,
            discount_code: present(self.discount_code),
            discount_amount: amount_or_zero(self.discount_amount.as_ref()),
            coins_used: self.coins_used.unwrap_or(0).max(0),
            payment_method: present(self.payment_method),
            payment_type: present(self.payment_type),
            payment_status,
            cod: self.cod.unwrap_or(false),
            affiliate_id,
        })
    }
}

/// Place an order: number it, store it, then run the follow-up side effects
/// in the background.
///
/// # Errors
///
/// Returns validation errors from [`CreateOrderRequest::into_new_order`] or
/// `OrderError::Repository` if the insert fails.
#[instrument(skip(state, request))]
pub async fn create_order(state: &AppState, request: CreateOrderRequest) -> Result<Order, OrderError> {
    let mut new_order = request.into_new_order()?;
    let pool = state.pool();

    if new_order.order_number.is_empty() {
        new_order.order_number = next_order_number(pool).await;
    }
    new_order.invoice_number = Some(next_invoice_number(pool).await);

    let order = OrderRepository::new(pool).create(&new_order).await?;
    info!(order_number = %order.order_number, total = %order.total, "Order created");

    let background = state.clone();
    let created = order.clone();
    tokio::spawn(async move {
        after_order_created(&background, &created).await;
    });

    Ok(order)
}

/// Follow-up work for a new order. Never fails; every step logs its own error.
#[instrument(skip(state, order), fields(order_number = %order.order_number))]
pub async fn after_order_created(state: &AppState, order: &Order) {
    if let Err(e) = alerts::record_new_order(state.pool(), order).await {
        warn!(error = %e, "Failed to record admin notification");
    }

    match shiprocket::auto_create(state.shiprocket(), state.pool(), order).await {
        Ok(AutoShipment::Created(shipment)) => {
            info!(shipment_id = ?shipment.shipment_id, "Shipment created automatically");
        }
        Ok(AutoShipment::Skipped(reason)) => info!(reason, "Automatic shipment skipped"),
        Err(e) => warn!(error = %e, "Automatic shipment failed"),
    }

    if let Some(email) = state.email() {
        if let Err(e) = email.send_order_confirmation(order, false).await {
            warn!(error = %e, "Failed to send order confirmation");
        }
        if let Err(e) = email.send_order_confirmation(order, true).await {
            warn!(error = %e, "Failed to send admin order copy");
        }
        if let Err(e) = email_invoice(state, order).await {
            warn!(error = %e, "Failed to send invoice email");
        }
    }
}

/// Email the invoice to the customer, as a PDF when the renderer works and
/// as HTML otherwise. Returns the invoice number.
///
/// # Errors
///
/// Returns `OrderError::EmailDisabled` without SMTP settings, or the
/// invoice or delivery error.
#[instrument(skip(state, order), fields(order_number = %order.order_number))]
pub async fn email_invoice(state: &AppState, order: &Order) -> Result<String, OrderError> {
    let email = state.email().ok_or(OrderError::EmailDisabled)?;

    let view = prepare_invoice(state.pool(), order, &state.config().public_base_url).await?;
    let html = render_html(&view)?;

    let document = match state.pdf().render(&html).await {
        Ok(pdf) => InvoiceDocument::Pdf(pdf),
        Err(e) => {
            warn!(error = %e, "PDF rendering failed, attaching HTML invoice");
            InvoiceDocument::Html(html)
        }
    };

    email.send_invoice(order, &view.invoice_number, document).await?;
    Ok(view.invoice_number)
}

// =============================================================================
// Admin updates
// =============================================================================

/// Fields an admin may change on an order, plus a history note.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub tracking_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub cod: Option<bool>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub note: Option<String>,
}

impl UpdateOrderRequest {
    /// Validate into column changes and an optional note.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NoFieldsToUpdate` for an empty request and
    /// `OrderError::InvalidField` for unknown statuses, a malformed email or
    /// non-object addresses.
    pub fn into_changes(self) -> Result<(OrderChanges, Option<String>), OrderError> {
        let status = self
            .status
            .map(|s| s.parse::<OrderStatus>().map_err(|_| OrderError::InvalidField("status")))
            .transpose()?;
        let payment_status = self
            .payment_status
            .map(|s| {
                s.parse::<PaymentStatus>()
                    .map_err(|_| OrderError::InvalidField("payment_status"))
            })
            .transpose()?;
        let customer_email = self
            .customer_email
            .map(|e| {
                Email::parse(&e)
                    .map(Email::into_inner)
                    .map_err(|_| OrderError::InvalidField("customer_email"))
            })
            .transpose()?;
        let shipping_address = self
            .shipping_address
            .map(|v| Address::from_value(v).ok_or(OrderError::InvalidField("shipping_address")))
            .transpose()?;
        let billing_address = self
            .billing_address
            .map(|v| Address::from_value(v).ok_or(OrderError::InvalidField("billing_address")))
            .transpose()?;

        let changes = OrderChanges {
            status,
            payment_status,
            payment_method: self.payment_method,
            tracking_url: self.tracking_url,
            tags: self.tags,
            cod: self.cod,
            shipping_address,
            billing_address,
            customer_name: present(self.customer_name),
            customer_email,
        };
        let note = present(self.note);

        if changes.is_empty() && note.is_none() {
            return Err(OrderError::NoFieldsToUpdate);
        }
        Ok((changes, note))
    }
}

/// Apply an admin update and run the status transition side effects.
///
/// # Errors
///
/// Returns validation errors, `OrderError::NotFound` for an unknown order or
/// `OrderError::Repository` if the update fails.
#[instrument(skip(state, request))]
pub async fn update_order(
    state: &AppState,
    id: OrderId,
    request: UpdateOrderRequest,
    changed_by: Option<StaffUserId>,
) -> Result<Order, OrderError> {
    let (changes, note) = request.into_changes()?;

    let update = OrderRepository::new(state.pool())
        .update(id, &changes, note.as_deref(), changed_by)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => OrderError::NotFound,
            other => OrderError::Repository(other),
        })?;

    let order = update.order.clone();
    if let Some(status) = update.status_transition() {
        info!(
            order_number = %order.order_number,
            from = %update.previous_status,
            to = %status,
            "Order status changed"
        );

        if status == OrderStatus::Cancelled {
            cancel_order_side_effects(state, &order, note.as_deref(), changed_by).await;
        }

        let background = state.clone();
        let transitioned = order.clone();
        tokio::spawn(async move {
            notify_customer(&background, &transitioned, status).await;
        });
    }

    Ok(order)
}

/// Cancel the Shiprocket shipment and record the cancellation. Best effort.
async fn cancel_order_side_effects(
    state: &AppState,
    order: &Order,
    note: Option<&str>,
    changed_by: Option<StaffUserId>,
) {
    let shipments = ShipmentRepository::new(state.pool());
    match shipments.for_order(order.id).await {
        Ok(Some(shipment)) => {
            if let Some(remote_id) = shipment.shipment_id.as_deref() {
                match state.shiprocket().cancel_shipment(remote_id).await {
                    Ok(_) => {
                        info!(shipment_id = remote_id, "Shipment cancelled in Shiprocket");
                        if let Err(e) = shipments.set_status(order.id, ShipmentStatus::Cancelled).await {
                            warn!(error = %e, "Failed to mark shipment cancelled");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to cancel shipment in Shiprocket"),
                }
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to load shipment for cancellation"),
    }

    let reason = note.unwrap_or(DEFAULT_CANCEL_REASON);
    match OrderRepository::new(state.pool())
        .record_cancellation(order.id, reason, order.total, changed_by)
        .await
    {
        Ok(Some(_)) => info!(order_number = %order.order_number, "Cancellation recorded"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to record cancellation"),
    }
}

/// Tell the customer about a status change by email and WhatsApp.
///
/// Shipped and out-for-delivery send the shipped messages; delivered sends
/// the delivered messages; other changes send the generic status email.
#[instrument(skip(state, order), fields(order_number = %order.order_number))]
pub async fn notify_customer(state: &AppState, order: &Order, status: OrderStatus) {
    let tracking_url = match order.tracking_url.clone() {
        Some(url) => Some(url),
        None => ShipmentRepository::new(state.pool())
            .for_order(order.id)
            .await
            .ok()
            .flatten()
            .and_then(|s| s.public_tracking_url()),
    };

    if let Some(email) = state.email() {
        let sent = if status.is_in_transit() {
            email.send_order_shipped(order, tracking_url.as_deref()).await
        } else if status == OrderStatus::Delivered {
            email.send_order_delivered(order).await
        } else {
            email.send_status_update(order).await
        };
        if let Err(e) = sent {
            warn!(error = %e, "Failed to send status email");
        }
    }

    if !status.is_customer_notifiable() {
        return;
    }
    let (Some(whatsapp), Some(phone)) = (state.whatsapp(), order.customer_phone()) else {
        return;
    };

    let sent = if status == OrderStatus::Delivered {
        whatsapp
            .send_order_delivered(&phone, &order.customer_name, &order.order_number)
            .await
    } else {
        whatsapp
            .send_order_shipped(
                &phone,
                &order.customer_name,
                &order.order_number,
                tracking_url.as_deref(),
            )
            .await
    };
    if let Err(e) = sent {
        warn!(error = %e, "Failed to send WhatsApp status message");
    }
}

// =============================================================================
// Splitting
// =============================================================================

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Divide an order into the part it keeps and the part that moves.
///
/// Shipping and tax follow the subtotal share of the moved items; the kept
/// side takes the remainder so nothing is lost to rounding. Out-of-range and
/// repeated indexes are ignored.
///
/// # Errors
///
/// Returns `OrderError::NoItemIndexes` for an empty index list and
/// `OrderError::NothingToMove` when no index selects an item.
pub fn split_amounts(
    order: &Order,
    item_indexes: &[usize],
) -> Result<(SplitSide, SplitSide), OrderError> {
    if item_indexes.is_empty() {
        return Err(OrderError::NoItemIndexes);
    }

    let (moved_items, kept_items): (Vec<_>, Vec<_>) = order
        .items
        .iter()
        .enumerate()
        .partition(|(index, _)| item_indexes.contains(index));
    let moved_items: Vec<OrderItem> = moved_items.into_iter().map(|(_, item)| item.clone()).collect();
    let kept_items: Vec<OrderItem> = kept_items.into_iter().map(|(_, item)| item.clone()).collect();

    if moved_items.is_empty() {
        return Err(OrderError::NothingToMove);
    }

    let moved_subtotal = items_subtotal(&moved_items);
    let kept_subtotal = items_subtotal(&kept_items);
    let denominator = (moved_subtotal + kept_subtotal).max(Decimal::ONE);

    let moved_shipping = round2(order.shipping * moved_subtotal / denominator);
    let moved_tax = round2(order.tax * moved_subtotal / denominator);
    let kept_shipping = order.shipping - moved_shipping;
    let kept_tax = order.tax - moved_tax;

    let keep = SplitSide {
        total: kept_subtotal + kept_shipping + kept_tax,
        items: kept_items,
        subtotal: kept_subtotal,
        shipping: kept_shipping,
        tax: kept_tax,
    };
    let moved = SplitSide {
        total: moved_subtotal + moved_shipping + moved_tax,
        items: moved_items,
        subtotal: moved_subtotal,
        shipping: moved_shipping,
        tax: moved_tax,
    };
    Ok((keep, moved))
}

/// Amounts for both sides plus the new order's number, from the locked order.
///
/// # Errors
///
/// Same as [`split_amounts`].
pub fn plan_split(
    order: &Order,
    item_indexes: &[usize],
    now_millis: i64,
) -> Result<SplitPlan, OrderError> {
    let (keep, moved) = split_amounts(order, item_indexes)?;
    Ok(SplitPlan {
        keep,
        moved,
        split_number: split_order_number(&order.order_number, now_millis),
    })
}

/// Order number of a split: the original number, `-S` and the last four
/// digits of the current unix-millis timestamp.
#[must_use]
pub fn split_order_number(order_number: &str, now_millis: i64) -> String {
    format!("{order_number}-S{:04}", now_millis.rem_euclid(10_000))
}

/// Move the selected items of an order into a new order.
///
/// # Errors
///
/// Returns `OrderError::NotFound` for an unknown order, split validation
/// errors, or `OrderError::Repository` if the transaction fails.
#[instrument(skip(state))]
pub async fn split_order(
    state: &AppState,
    id: OrderId,
    item_indexes: &[usize],
) -> Result<(Order, Order), OrderError> {
    let (original, split) = OrderRepository::new(state.pool())
        .split(id, |locked| plan_split(locked, item_indexes, Utc::now().timestamp_millis()))
        .await
        .map_err(|e| match e {
            OrderError::Repository(RepositoryError::NotFound) => OrderError::NotFound,
            other => other,
        })?;
    info!(
        original = %original.order_number,
        split = %split.order_number,
        moved = split.items.len(),
        "Order split"
    );
    Ok((original, split))
}

// =============================================================================
// Listing and export
// =============================================================================

/// Page number, page size and row offset from raw query values.
#[must_use]
pub fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1) * limit)
}

/// Quote a CSV field when it contains a comma, quote or newline.
#[must_use]
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render orders as CSV with a header row.
#[must_use]
pub fn orders_csv(orders: &[Order]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for order in orders {
        let fields = [
            csv_field(&order.order_number),
            csv_field(&order.customer_name),
            csv_field(&order.customer_email),
            order.status.to_string(),
            order.subtotal.to_string(),
            order.shipping.to_string(),
            order.tax.to_string(),
            order.total.to_string(),
            order.created_at.to_rfc3339(),
        ];
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    csv
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn request() -> CreateOrderRequest {
        serde_json::from_value(json!({
            "customer_name": "Asha Verma",
            "customer_email": "Asha@Example.com",
            "shipping_address": {"address": "12 MG Road", "city": "Lucknow", "pincode": "226001"},
            "items": [
                {"name": "Face Serum", "price": 499, "quantity": 2},
                {"name": "Lip Balm", "price": "150"}
            ],
            "shipping": 50,
            "total": 1198
        }))
        .unwrap()
    }

    fn order_with_items(items: Value, shipping: &str, tax: &str) -> Order {
        let new_order = CreateOrderRequest {
            items: Some(items),
            ..request()
        }
        .into_new_order()
        .unwrap();

        Order {
            id: OrderId::new(10),
            order_number: "N-091206251001".to_string(),
            invoice_number: None,
            customer_name: new_order.customer_name,
            customer_email: new_order.customer_email,
            shipping_address: new_order.shipping_address,
            billing_address: None,
            items: new_order.items,
            subtotal: new_order.subtotal,
            shipping: dec(shipping),
            tax: dec(tax),
            total: new_order.total,
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
        }
    }

    #[test]
    fn test_create_request_defaults() {
        let order = request().into_new_order().unwrap();
        assert_eq!(order.customer_email, "asha@example.com");
        assert_eq!(order.subtotal, dec("1148"));
        assert_eq!(order.shipping, dec("50"));
        assert_eq!(order.tax, Decimal::ZERO);
        assert_eq!(order.total, dec("1198"));
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert!(order.order_number.is_empty());
        assert!(!order.cod);
    }

    #[test]
    fn test_create_request_missing_fields() {
        let missing_name = CreateOrderRequest {
            customer_name: Some("  ".to_string()),
            ..request()
        };
        assert!(matches!(missing_name.into_new_order(), Err(OrderError::MissingFields)));

        let empty_items = CreateOrderRequest {
            items: Some(json!([])),
            ..request()
        };
        assert!(matches!(empty_items.into_new_order(), Err(OrderError::MissingFields)));

        let no_total = CreateOrderRequest {
            total: None,
            ..request()
        };
        assert_eq!(no_total.into_new_order().unwrap_err().to_string(), "Missing required fields");
    }

    #[test]
    fn test_create_request_invalid_total() {
        for total in [json!("1198"), json!(-1), json!(true)] {
            let req = CreateOrderRequest {
                total: Some(total),
                ..request()
            };
            assert_eq!(req.into_new_order().unwrap_err().to_string(), "Invalid total amount");
        }

        let free = CreateOrderRequest {
            total: Some(json!(0)),
            ..request()
        };
        assert_eq!(free.into_new_order().unwrap().total, Decimal::ZERO);
    }

    #[test]
    fn test_create_request_rejects_bad_email() {
        let req = CreateOrderRequest {
            customer_email: Some("not-an-email".to_string()),
            ..request()
        };
        assert!(matches!(req.into_new_order(), Err(OrderError::InvalidField("customer_email"))));
    }

    #[test]
    fn test_create_request_rejects_non_object_items() {
        for items in [json!([{"name": "Face Serum"}, "Lip Balm"]), json!([7]), json!([null])] {
            let req = CreateOrderRequest {
                items: Some(items),
                ..request()
            };
            assert!(matches!(req.into_new_order(), Err(OrderError::InvalidField("items"))));
        }
    }

    #[test]
    fn test_update_request_validation() {
        let empty = UpdateOrderRequest::default();
        assert!(matches!(empty.into_changes(), Err(OrderError::NoFieldsToUpdate)));

        let note_only = UpdateOrderRequest {
            note: Some("Called customer".to_string()),
            ..UpdateOrderRequest::default()
        };
        let (changes, note) = note_only.into_changes().unwrap();
        assert!(changes.is_empty());
        assert_eq!(note.as_deref(), Some("Called customer"));

        let bad_status = UpdateOrderRequest {
            status: Some("teleported".to_string()),
            ..UpdateOrderRequest::default()
        };
        assert_eq!(bad_status.into_changes().unwrap_err().to_string(), "Invalid status");

        let shipped = UpdateOrderRequest {
            status: Some("shipped".to_string()),
            cod: Some(true),
            ..UpdateOrderRequest::default()
        };
        let (changes, _) = shipped.into_changes().unwrap();
        assert_eq!(changes.status, Some(OrderStatus::Shipped));
        assert_eq!(changes.cod, Some(true));
    }

    #[test]
    fn test_split_amounts_proportional() {
        let order = order_with_items(
            json!([
                {"name": "A", "price": 300},
                {"name": "B", "price": 100}
            ]),
            "40",
            "72",
        );

        let (keep, moved) = split_amounts(&order, &[1]).unwrap();
        assert_eq!(moved.subtotal, dec("100"));
        assert_eq!(moved.shipping, dec("10"));
        assert_eq!(moved.tax, dec("18"));
        assert_eq!(moved.total, dec("128"));
        assert_eq!(keep.subtotal, dec("300"));
        assert_eq!(keep.shipping, dec("30"));
        assert_eq!(keep.tax, dec("54"));
        assert_eq!(keep.total, dec("384"));
        assert_eq!(keep.items.len(), 1);
        assert_eq!(moved.items.len(), 1);
    }

    #[test]
    fn test_split_amounts_rounding_keeps_totals() {
        let order = order_with_items(
            json!([
                {"name": "A", "price": 1},
                {"name": "B", "price": 1},
                {"name": "C", "price": 1}
            ]),
            "10",
            "0",
        );

        let (keep, moved) = split_amounts(&order, &[0]).unwrap();
        assert_eq!(moved.shipping, dec("3.33"));
        assert_eq!(keep.shipping, dec("6.67"));
        assert_eq!(keep.shipping + moved.shipping, order.shipping);
    }

    #[test]
    fn test_split_amounts_errors() {
        let order = order_with_items(json!([{"name": "A", "price": 10}]), "0", "0");
        assert!(matches!(split_amounts(&order, &[]), Err(OrderError::NoItemIndexes)));
        assert!(matches!(split_amounts(&order, &[5]), Err(OrderError::NothingToMove)));

        let (keep, moved) = split_amounts(&order, &[0, 0]).unwrap();
        assert!(keep.items.is_empty());
        assert_eq!(moved.items.len(), 1);
    }

    #[test]
    fn test_plan_split_uses_given_order() {
        let order = order_with_items(
            json!([
                {"name": "A", "price": 300},
                {"name": "B", "price": 100}
            ]),
            "40",
            "72",
        );

        let plan = plan_split(&order, &[0], 1_718_000_000_777).unwrap();
        assert_eq!(plan.split_number, format!("{}-S0777", order.order_number));
        assert_eq!(plan.moved.subtotal, dec("300"));
        assert_eq!(plan.keep.items.len(), 1);
        assert!(matches!(plan_split(&order, &[9], 0), Err(OrderError::NothingToMove)));
    }

    #[test]
    fn test_split_order_number() {
        assert_eq!(split_order_number("N-091206251001", 1_718_000_001_234), "N-091206251001-S1234");
        assert_eq!(split_order_number("N-1", 1_718_000_000_042), "N-1-S0042");
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(None, None), (1, 50, 0));
        assert_eq!(page_window(Some(3), Some(20)), (3, 20, 40));
        assert_eq!(page_window(Some(0), Some(1000)), (1, 200, 0));
        assert_eq!(page_window(Some(-2), Some(0)), (1, 1, 0));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Verma, Asha"), "\"Verma, Asha\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_orders_csv() {
        let mut order = order_with_items(json!([{"name": "A", "price": 10}]), "0", "0");
        order.customer_name = "Verma, Asha".to_string();

        let csv = orders_csv(&[order]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.starts_with("N-091206251001,\"Verma, Asha\",asha@example.com,pending,"));
    }
}
