//! Order domain types.
//!
//! Addresses and line items arrive from the storefront as loosely shaped JSON
//! (`address` or `street`, `qty` or `quantity`, prices as numbers or strings).
//! They are kept verbatim so nothing the storefront sent is lost, and read
//! through typed accessors that know the accepted spellings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nefol_core::{CancellationStatus, OrderId, OrderStatus, PaymentStatus};

// =============================================================================
// JSON helpers
// =============================================================================

/// First non-empty string among `keys`. Numbers are rendered as strings.
fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First value among `keys` that reads as a decimal.
fn first_decimal(map: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(json_decimal))
}

/// Read a JSON number or numeric string as a `Decimal`.
#[must_use]
pub fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

// =============================================================================
// Address
// =============================================================================

/// A shipping or billing address as sent by the storefront.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Map<String, Value>);

impl Address {
    /// Wrap a JSON object. Returns `None` for non-objects.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Recipient's full name, if the address carries one.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        first_text(&self.0, &["name", "fullName", "full_name"])
    }

    #[must_use]
    pub fn first_name(&self) -> Option<String> {
        first_text(&self.0, &["firstName", "first_name"])
    }

    #[must_use]
    pub fn last_name(&self) -> Option<String> {
        first_text(&self.0, &["lastName", "last_name"])
    }

    /// Street line (`address` or `street`).
    #[must_use]
    pub fn line1(&self) -> Option<String> {
        first_text(&self.0, &["address", "street"])
    }

    /// Second line (`apartment` or `area`).
    #[must_use]
    pub fn line2(&self) -> Option<String> {
        first_text(&self.0, &["apartment", "area"])
    }

    #[must_use]
    pub fn city(&self) -> Option<String> {
        first_text(&self.0, &["city"])
    }

    /// Postal code (`zip` or `pincode`).
    #[must_use]
    pub fn pincode(&self) -> Option<String> {
        first_text(&self.0, &["zip", "pincode"])
    }

    #[must_use]
    pub fn state(&self) -> Option<String> {
        first_text(&self.0, &["state"])
    }

    /// Country, defaulting to India.
    #[must_use]
    pub fn country(&self) -> String {
        first_text(&self.0, &["country"]).unwrap_or_else(|| "India".to_string())
    }

    #[must_use]
    pub fn phone(&self) -> Option<String> {
        first_text(&self.0, &["phone", "mobile"])
    }

    /// Whether a courier could deliver to this address: a street line, a city
    /// and a postal code are all present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.line1().is_some() && self.city().is_some() && self.pincode().is_some()
    }

    /// Single-line rendering for invoices and emails.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.line1(),
            self.line2(),
            self.city(),
            self.state(),
            self.pincode(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

// =============================================================================
// Line items
// =============================================================================

/// One line of an order's `items` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItem(Map<String, Value>);

impl OrderItem {
    /// Wrap a JSON object. Returns `None` for non-objects.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Display name, falling back to `Product {position}` (1-based).
    #[must_use]
    pub fn display_name(&self, position: usize) -> String {
        first_text(&self.0, &["name", "title"]).unwrap_or_else(|| format!("Product {position}"))
    }

    /// SKU, falling back to the variant id, then `SKU-{product_id or position}`.
    #[must_use]
    pub fn sku(&self, position: usize) -> String {
        first_text(&self.0, &["sku", "variant_id"]).unwrap_or_else(|| {
            let product = first_text(&self.0, &["product_id"]).unwrap_or_else(|| position.to_string());
            format!("SKU-{product}")
        })
    }

    /// Quantity (`qty` or `quantity`), at least 1.
    #[must_use]
    pub fn quantity(&self) -> i64 {
        first_decimal(&self.0, &["qty", "quantity"])
            .and_then(|q| q.trunc().to_i64())
            .filter(|q| *q > 0)
            .unwrap_or(1)
    }

    /// Unit selling price (`price` or `unit_price`).
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        first_decimal(&self.0, &["price", "unit_price"]).unwrap_or_default()
    }

    /// Unit price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity())
    }

    /// Discount applied to this line.
    #[must_use]
    pub fn discount(&self) -> Decimal {
        first_decimal(&self.0, &["discount", "discount_amount"]).unwrap_or_default()
    }

    /// Item-specific GST rate in percent, when set.
    #[must_use]
    pub fn tax_rate(&self) -> Option<Decimal> {
        first_decimal(&self.0, &["taxRate", "tax_rate"])
    }

    #[must_use]
    pub fn hsn(&self) -> Option<String> {
        first_text(&self.0, &["hsn", "hsnCode", "hsn_code"])
    }

    /// Whether the item is a combo pack (category, slug or title mention `combo`).
    #[must_use]
    pub fn is_combo(&self) -> bool {
        let mentions_combo = |text: Option<String>| {
            text.is_some_and(|v| v.to_lowercase().contains("combo"))
        };
        let nested_category = match self.0.get("details") {
            Some(Value::Object(details)) => first_text(details, &["category"]),
            _ => None,
        };

        mentions_combo(first_text(&self.0, &["category"]).or(nested_category))
            || mentions_combo(first_text(&self.0, &["slug"]))
            || mentions_combo(first_text(&self.0, &["title", "name"]))
    }
}

/// Whether any item in the order is a combo pack.
#[must_use]
pub fn is_combo_order(items: &[OrderItem]) -> bool {
    items.iter().any(OrderItem::is_combo)
}

/// Sum of `unit price × quantity` over the items.
#[must_use]
pub fn items_subtotal(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

// =============================================================================
// Orders
// =============================================================================

/// An order (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub invoice_number: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub discount_code: Option<String>,
    pub discount_amount: Decimal,
    pub coins_used: i32,
    pub payment_method: Option<String>,
    pub payment_type: Option<String>,
    pub payment_status: PaymentStatus,
    pub cod: bool,
    pub status: OrderStatus,
    pub tags: Vec<String>,
    pub affiliate_id: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order is cash on delivery.
    #[must_use]
    pub fn is_cod(&self) -> bool {
        self.cod
            || [self.payment_method.as_deref(), self.payment_type.as_deref()]
                .into_iter()
                .flatten()
                .any(|m| m.eq_ignore_ascii_case("cod"))
    }

    /// Whether the given email matches the customer's (case-insensitive).
    #[must_use]
    pub fn belongs_to(&self, email: &str) -> bool {
        self.customer_email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Phone number to reach the customer, from the shipping then billing address.
    #[must_use]
    pub fn customer_phone(&self) -> Option<String> {
        self.shipping_address
            .phone()
            .or_else(|| self.billing_address.as_ref().and_then(Address::phone))
    }
}

/// New order to insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub invoice_number: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub discount_code: Option<String>,
    pub discount_amount: Decimal,
    pub coins_used: i32,
    pub payment_method: Option<String>,
    pub payment_type: Option<String>,
    pub payment_status: PaymentStatus,
    pub cod: bool,
    pub affiliate_id: Option<String>,
}

/// Whitelisted fields an admin may change on an order.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    pub tracking_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub cod: Option<bool>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

impl OrderChanges {
    /// True when no column would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment_status.is_none()
            && self.payment_method.is_none()
            && self.tracking_url.is_none()
            && self.tags.is_none()
            && self.cod.is_none()
            && self.shipping_address.is_none()
            && self.billing_address.is_none()
            && self.customer_name.is_none()
            && self.customer_email.is_none()
    }
}

/// Filters for listing and exporting orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub cod: Option<bool>,
    /// Matches customer name or email.
    pub customer: Option<String>,
    /// Matches order number.
    pub query: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// One row of an order's status history.
#[derive(Debug, Clone, Serialize)]
pub struct StatusHistoryEntry {
    pub id: i32,
    pub order_id: OrderId,
    pub old_status: Option<String>,
    pub new_status: String,
    pub note: Option<String>,
    pub changed_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A cancellation record.
#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub id: i32,
    pub order_id: OrderId,
    pub cancellation_type: String,
    pub reason: String,
    pub status: CancellationStatus,
    pub refund_amount: Decimal,
    pub processed_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn item(value: Value) -> OrderItem {
        OrderItem::from_value(value).unwrap()
    }

    #[test]
    fn test_address_accepts_alternate_keys() {
        let address = Address::from_value(json!({
            "street": "12 Hazratganj",
            "area": "Near GPO",
            "city": "Lucknow",
            "pincode": 226001,
            "state": "Uttar Pradesh",
            "phone": "+91 98765 43210"
        }))
        .unwrap();

        assert_eq!(address.line1().as_deref(), Some("12 Hazratganj"));
        assert_eq!(address.line2().as_deref(), Some("Near GPO"));
        assert_eq!(address.pincode().as_deref(), Some("226001"));
        assert_eq!(address.country(), "India");
        assert!(address.is_complete());
        assert_eq!(
            address.one_line(),
            "12 Hazratganj, Near GPO, Lucknow, Uttar Pradesh, 226001"
        );
    }

    #[test]
    fn test_incomplete_address() {
        let address = Address::from_value(json!({"address": "  ", "city": "Pune", "zip": "411001"})).unwrap();
        assert!(!address.is_complete());
        assert!(Address::from_value(json!("just text")).is_none());
    }

    #[test]
    fn test_item_quantity_and_price() {
        let line = item(json!({"title": "Face Wash", "qty": 3, "price": "249.50"}));
        assert_eq!(line.quantity(), 3);
        assert_eq!(line.unit_price(), Decimal::new(24950, 2));
        assert_eq!(line.line_total(), Decimal::new(74850, 2));
        assert_eq!(line.display_name(1), "Face Wash");

        let bare = item(json!({"quantity": 0, "unit_price": 100}));
        assert_eq!(bare.quantity(), 1);
        assert_eq!(bare.display_name(5), "Product 5");
    }

    #[test]
    fn test_item_sku_fallbacks() {
        assert_eq!(item(json!({"sku": "NF-01"})).sku(0), "NF-01");
        assert_eq!(item(json!({"variant_id": 88})).sku(0), "88");
        assert_eq!(item(json!({"product_id": 12})).sku(0), "SKU-12");
        assert_eq!(item(json!({})).sku(2), "SKU-2");
    }

    #[test]
    fn test_combo_detection() {
        let items = vec![
            item(json!({"name": "Serum", "category": "Skincare"})),
            item(json!({"name": "Glow Kit", "slug": "glow-COMBO-pack"})),
        ];
        assert!(is_combo_order(&items));
        assert!(!is_combo_order(&items[..1]));
    }

    #[test]
    fn test_items_subtotal() {
        let items = vec![
            item(json!({"price": 100, "qty": 2})),
            item(json!({"price": 50.5})),
        ];
        assert_eq!(items_subtotal(&items), Decimal::new(2505, 1));
    }

    #[test]
    fn test_json_decimal() {
        assert_eq!(json_decimal(&json!(12.5)), Some(Decimal::new(125, 1)));
        assert_eq!(json_decimal(&json!(" 7 ")), Some(Decimal::from(7)));
        assert_eq!(json_decimal(&json!(null)), None);
        assert_eq!(json_decimal(&json!("abc")), None);
    }

    #[test]
    fn test_order_changes_empty() {
        assert!(OrderChanges::default().is_empty());
        let changes = OrderChanges {
            cod: Some(true),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
