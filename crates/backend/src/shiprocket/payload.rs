//! Ad-hoc order payload and response extractors.
//!
//! Shiprocket's responses are not consistent about where they put ids: the
//! shipment id may sit at the top level, under `data` or under `response`.
//! The extractors here look in every known place.

use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::models::order::{Address, Order};
use crate::services::sequences::to_ist;

/// Pickup location used when Shiprocket offers none.
pub const DEFAULT_PICKUP_LOCATION: &str = "Home";

/// Parcel dimensions in centimetres.
const PARCEL_SIDE_CM: u32 = 10;

/// Parcel weight in kilograms.
const PARCEL_WEIGHT_KG: f64 = 0.5;

// =============================================================================
// Payload
// =============================================================================

/// Last ten digits of a phone number, or every digit when there are fewer.
#[must_use]
pub fn ten_digit_phone(raw: Option<&str>) -> String {
    let digits: String = raw.unwrap_or_default().chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 10 {
        digits[digits.len() - 10..].to_string()
    } else {
        digits
    }
}

/// First and last name for an address, from its own fields or by splitting
/// the customer's name at the first space.
fn split_name(address: &Address, customer_name: &str) -> (String, String) {
    let mut parts = customer_name.trim().splitn(2, ' ');
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.next().unwrap_or_default().trim().to_string();

    (
        address.first_name().unwrap_or(first),
        address.last_name().unwrap_or(last),
    )
}

/// Address fields under a `billing_` or `shipping_` prefix.
fn address_fields(prefix: &str, address: &Address, order: &Order, phone: &str) -> Vec<(String, Value)> {
    let (first, last) = split_name(address, &order.customer_name);
    let text = |v: Option<String>| Value::String(v.unwrap_or_default());

    vec![
        (format!("{prefix}_customer_name"), Value::String(first)),
        (format!("{prefix}_last_name"), Value::String(last)),
        (format!("{prefix}_address"), text(address.line1())),
        (format!("{prefix}_address_2"), text(address.line2())),
        (format!("{prefix}_city"), text(address.city())),
        (format!("{prefix}_pincode"), text(address.pincode())),
        (format!("{prefix}_state"), text(address.state())),
        (format!("{prefix}_country"), Value::String(address.country())),
        (format!("{prefix}_email"), Value::String(order.customer_email.clone())),
        (format!("{prefix}_phone"), Value::String(phone.to_string())),
    ]
}

fn amount(value: Decimal) -> Value {
    json!(value.round_dp(2))
}

/// Build the `POST /orders/create/adhoc` body for an order.
#[must_use]
pub fn adhoc_order(order: &Order, pickup_location: &str) -> Value {
    let shipping = &order.shipping_address;
    let billing = order.billing_address.as_ref().filter(|b| !b.as_map().is_empty());
    let billing_source = billing.unwrap_or(shipping);

    let shipping_phone = ten_digit_phone(shipping.phone().as_deref());
    let billing_phone = ten_digit_phone(
        billing_source
            .phone()
            .or_else(|| shipping.phone())
            .as_deref(),
    );

    let order_items: Vec<Value> = order
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            json!({
                "name": item.display_name(index + 1),
                "sku": item.sku(index + 1),
                "units": item.quantity(),
                "selling_price": amount(item.unit_price()),
                "discount": 0,
                "tax": "",
            })
        })
        .collect();

    let mut payload = serde_json::Map::new();
    payload.insert("order_id".into(), Value::String(shiprocket_order_id(order)));
    payload.insert(
        "order_date".into(),
        Value::String(to_ist(order.created_at).format("%Y-%m-%d %H:%M").to_string()),
    );
    payload.insert("pickup_location".into(), Value::String(pickup_location.to_string()));
    payload.extend(address_fields("billing", billing_source, order, &billing_phone));
    payload.insert("shipping_is_billing".into(), Value::Bool(billing.is_none()));
    payload.extend(address_fields("shipping", shipping, order, &shipping_phone));
    payload.insert("order_items".into(), Value::Array(order_items));
    payload.insert(
        "payment_method".into(),
        Value::String(if order.is_cod() { "COD" } else { "Prepaid" }.to_string()),
    );
    payload.insert("sub_total".into(), amount(order.subtotal));
    payload.insert("length".into(), json!(PARCEL_SIDE_CM));
    payload.insert("breadth".into(), json!(PARCEL_SIDE_CM));
    payload.insert("height".into(), json!(PARCEL_SIDE_CM));
    payload.insert("weight".into(), json!(PARCEL_WEIGHT_KG));
    payload.insert("total_discount".into(), amount(order.discount_amount));
    payload.insert("shipping_charges".into(), amount(order.shipping));
    payload.insert("giftwrap_charges".into(), json!(0));
    payload.insert("transaction_charges".into(), json!(0));
    payload.insert("cod_charges".into(), json!(0));
    payload.insert(
        "comment".into(),
        Value::String(format!("Order from NEFOL - {}", order.order_number)),
    );

    Value::Object(payload)
}

/// The `order_id` sent to Shiprocket for an order.
#[must_use]
pub fn shiprocket_order_id(order: &Order) -> String {
    if order.order_number.is_empty() {
        format!("ORDER-{}", order.id)
    } else {
        order.order_number.clone()
    }
}

// =============================================================================
// Response extractors
// =============================================================================

/// Render an id that may arrive as a number or a string.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}

/// First id found at `key` in the body, under `data` or under `response`.
fn nested_id(body: &Value, key: &str) -> Option<String> {
    [&body[key], &body["data"][key], &body["response"][key]]
        .into_iter()
        .find_map(id_text)
}

/// Shipment id from an ad-hoc create response.
#[must_use]
pub fn shipment_id(body: &Value) -> Option<String> {
    nested_id(body, "shipment_id")
}

/// Shiprocket's own order id from an ad-hoc create response.
#[must_use]
pub fn order_id(body: &Value) -> Option<String> {
    nested_id(body, "order_id")
}

/// Shipment id from a `GET /orders?order_id=` listing.
#[must_use]
pub fn listed_shipment_id(body: &Value) -> Option<String> {
    shipment_id(body).or_else(|| {
        let first = &body["data"][0];
        id_text(&first["shipment_id"]).or_else(|| {
            first["shipments"]
                .as_array()
                .and_then(|shipments| shipments.first())
                .and_then(|s| id_text(&s["id"]))
        })
    })
}

/// AWB code from an assign or create response.
#[must_use]
pub fn awb_code(body: &Value) -> Option<String> {
    nested_id(body, "awb_code").or_else(|| id_text(&body["response"]["data"]["awb_code"]))
}

/// Courier name from an AWB assignment response.
#[must_use]
pub fn courier_name(body: &Value) -> Option<String> {
    [&body["response"]["data"]["courier_name"], &body["courier_name"]]
        .into_iter()
        .find_map(id_text)
}

/// Label URL from a label generation response.
#[must_use]
pub fn label_url(body: &Value) -> Option<String> {
    [&body["label_url"], &body["label_url_pdf"], &body["response"]["label_url"]]
        .into_iter()
        .find_map(id_text)
}

/// Pickup location names listed by `GET /settings/company/pickup`.
fn pickup_names(body: &Value) -> Vec<String> {
    let locations = body["data"]["shipping_address"]
        .as_array()
        .or_else(|| body["data"].as_array())
        .or_else(|| body.as_array());

    locations
        .map(|list| {
            list.iter()
                .filter_map(|loc| id_text(&loc["pickup_location"]).or_else(|| id_text(&loc["id"])))
                .collect()
        })
        .unwrap_or_default()
}

/// Choose the pickup location: `Home` when present, else the first listed.
#[must_use]
pub fn choose_pickup_location(body: &Value) -> String {
    let names = pickup_names(body);
    names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(DEFAULT_PICKUP_LOCATION))
        .or_else(|| names.first())
        .cloned()
        .unwrap_or_else(|| DEFAULT_PICKUP_LOCATION.to_string())
}

/// Pickup location suggested in a "wrong pickup location" error body.
#[must_use]
pub fn suggested_pickup_location(body: &Value) -> String {
    [&body["data"]["data"][0], &body["data"][0]]
        .into_iter()
        .find_map(|loc| id_text(&loc["pickup_location"]).or_else(|| id_text(&loc["id"])))
        .unwrap_or_else(|| DEFAULT_PICKUP_LOCATION.to_string())
}

/// Human readable message from an error body.
#[must_use]
pub fn error_message(body: &Value) -> Option<String> {
    [&body["message"], &body["error"], &body["errors"]]
        .into_iter()
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(_) | Value::Array(_) => Some(v.to_string()),
            _ => None,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::order::OrderItem;
    use nefol_core::{OrderId, OrderStatus, PaymentStatus};

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            order_number: "N-091206251001".to_string(),
            invoice_number: None,
            customer_name: "Asha Verma Singh".to_string(),
            customer_email: "asha@example.com".to_string(),
            shipping_address: Address::from_value(json!({
                "street": "12 MG Road",
                "area": "Hazratganj",
                "city": "Lucknow",
                "zip": "226001",
                "state": "Uttar Pradesh",
                "phone": "+91 98765-43210"
            }))
            .unwrap(),
            billing_address: None,
            items: vec![
                OrderItem::from_value(json!({"title": "Face Serum", "price": "499", "qty": 2})).unwrap(),
                OrderItem::from_value(json!({"product_id": 7, "unit_price": 250})).unwrap(),
            ],
            subtotal: Decimal::from(1248),
            shipping: Decimal::from(50),
            tax: Decimal::ZERO,
            total: Decimal::from(1298),
            discount_code: None,
            discount_amount: Decimal::ZERO,
            coins_used: 0,
            payment_method: Some("cod".to_string()),
            payment_type: None,
            payment_status: PaymentStatus::Unpaid,
            cod: false,
            status: OrderStatus::Pending,
            tags: vec![],
            affiliate_id: None,
            tracking_url: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 12, 4, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 12, 4, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_ten_digit_phone() {
        assert_eq!(ten_digit_phone(Some("+91 98765-43210")), "9876543210");
        assert_eq!(ten_digit_phone(Some("98765 43210")), "9876543210");
        assert_eq!(ten_digit_phone(Some("12345")), "12345");
        assert_eq!(ten_digit_phone(None), "");
    }

    #[test]
    fn test_adhoc_order_payload() {
        let payload = adhoc_order(&order(), "Home");

        assert_eq!(payload["order_id"], "N-091206251001");
        assert_eq!(payload["order_date"], "2025-06-12 09:30");
        assert_eq!(payload["pickup_location"], "Home");
        assert_eq!(payload["billing_customer_name"], "Asha");
        assert_eq!(payload["billing_last_name"], "Verma Singh");
        assert_eq!(payload["billing_address"], "12 MG Road");
        assert_eq!(payload["billing_address_2"], "Hazratganj");
        assert_eq!(payload["billing_pincode"], "226001");
        assert_eq!(payload["billing_country"], "India");
        assert_eq!(payload["billing_phone"], "9876543210");
        assert_eq!(payload["shipping_is_billing"], true);
        assert_eq!(payload["shipping_city"], "Lucknow");
        assert_eq!(payload["payment_method"], "COD");
        assert_eq!(payload["weight"], 0.5);
        assert_eq!(payload["length"], 10);
        assert_eq!(payload["cod_charges"], 0);
        assert_eq!(payload["comment"], "Order from NEFOL - N-091206251001");

        let items = payload["order_items"].as_array().unwrap();
        assert_eq!(items[0]["name"], "Face Serum");
        assert_eq!(items[0]["units"], 2);
        assert_eq!(items[1]["name"], "Product 2");
        assert_eq!(items[1]["sku"], "SKU-7");
        assert_eq!(items[1]["units"], 1);
        assert_eq!(items[1]["tax"], "");
    }

    #[test]
    fn test_adhoc_order_uses_billing_address_and_names() {
        let mut order = order();
        order.payment_method = Some("razorpay".to_string());
        order.discount_amount = Decimal::from_str("100.00").unwrap();
        order.billing_address = Address::from_value(json!({
            "firstName": "Ravi",
            "lastName": "Kumar",
            "address": "1 Park Street",
            "city": "Kolkata",
            "pincode": "700016",
            "phone": "9000000001"
        }));

        let payload = adhoc_order(&order, "Warehouse");
        assert_eq!(payload["billing_customer_name"], "Ravi");
        assert_eq!(payload["billing_last_name"], "Kumar");
        assert_eq!(payload["billing_city"], "Kolkata");
        assert_eq!(payload["billing_phone"], "9000000001");
        assert_eq!(payload["shipping_customer_name"], "Asha");
        assert_eq!(payload["shipping_is_billing"], false);
        assert_eq!(payload["payment_method"], "Prepaid");
        assert_eq!(payload["total_discount"], "100.00");
    }

    #[test]
    fn test_shipment_id_locations() {
        assert_eq!(shipment_id(&json!({"shipment_id": 123})).as_deref(), Some("123"));
        assert_eq!(shipment_id(&json!({"data": {"shipment_id": "77"}})).as_deref(), Some("77"));
        assert_eq!(shipment_id(&json!({"response": {"shipment_id": 5}})).as_deref(), Some("5"));
        assert_eq!(shipment_id(&json!({"shipment_id": 0})), None);
        assert_eq!(shipment_id(&json!({})), None);

        let listed = json!({"data": [{"id": 9, "shipments": [{"id": 314}]}]});
        assert_eq!(listed_shipment_id(&listed).as_deref(), Some("314"));
    }

    #[test]
    fn test_awb_and_label_extraction() {
        let assigned = json!({"awb_assign_status": 1, "response": {"data": {"awb_code": "1410", "courier_name": "Delhivery"}}});
        assert_eq!(awb_code(&assigned).as_deref(), Some("1410"));
        assert_eq!(courier_name(&assigned).as_deref(), Some("Delhivery"));
        assert_eq!(awb_code(&json!({"awb_code": "99"})).as_deref(), Some("99"));

        assert_eq!(
            label_url(&json!({"label_url_pdf": "https://x/l.pdf"})).as_deref(),
            Some("https://x/l.pdf")
        );
        assert_eq!(label_url(&json!({"label_created": 0})), None);
    }

    #[test]
    fn test_choose_pickup_location() {
        let body = json!({"data": {"shipping_address": [
            {"pickup_location": "Warehouse"},
            {"pickup_location": "home"}
        ]}});
        assert_eq!(choose_pickup_location(&body), "home");

        let body = json!({"data": [{"pickup_location": "Warehouse"}]});
        assert_eq!(choose_pickup_location(&body), "Warehouse");

        assert_eq!(choose_pickup_location(&json!({})), "Home");
    }

    #[test]
    fn test_suggested_pickup_location() {
        let body = json!({"message": "Wrong Pickup location", "data": {"data": [{"pickup_location": "Office"}]}});
        assert_eq!(suggested_pickup_location(&body), "Office");

        let body = json!({"data": [{"id": 12}]});
        assert_eq!(suggested_pickup_location(&body), "12");

        assert_eq!(suggested_pickup_location(&json!({"message": "x"})), "Home");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(&json!({"message": "Bad"})).as_deref(), Some("Bad"));
        assert_eq!(
            error_message(&json!({"errors": {"pincode": ["invalid"]}})).as_deref(),
            Some(r#"{"pincode":["invalid"]}"#)
        );
        assert_eq!(error_message(&json!({})), None);
    }
}
