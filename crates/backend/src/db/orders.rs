//! Order repository for database operations.
//!
//! Queries are built at runtime (`query_as::<_, Row>` and `QueryBuilder` for
//! the filtered listings) and mapped through internal row types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use nefol_core::{CancellationStatus, OrderId, OrderStatus, PaymentStatus, StaffUserId};

use super::RepositoryError;
use crate::models::order::{
    Address, Cancellation, NewOrder, Order, OrderChanges, OrderFilter, OrderItem,
    StatusHistoryEntry,
};

/// Columns selected for every order query.
const ORDER_COLUMNS: &str = "id, order_number, invoice_number, customer_name, customer_email, \
     shipping_address, billing_address, items, subtotal, shipping, tax, total, discount_code, \
     discount_amount, coins_used, payment_method, payment_type, payment_status, cod, status, \
     tags, affiliate_id, tracking_url, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    invoice_number: Option<String>,
    customer_name: String,
    customer_email: String,
    shipping_address: Value,
    billing_address: Option<Value>,
    items: Value,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    discount_code: Option<String>,
    discount_amount: Decimal,
    coins_used: i32,
    payment_method: Option<String>,
    payment_type: Option<String>,
    payment_status: String,
    cod: bool,
    status: String,
    tags: Vec<String>,
    affiliate_id: Option<String>,
    tracking_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Decode an address column, tolerating rows that stored the JSON as a string.
fn decode_address(value: Value) -> Result<Address, RepositoryError> {
    let value = match value {
        Value::String(raw) => serde_json::from_str(&raw).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid address JSON in database: {e}"))
        })?,
        Value::Null => return Ok(Address::default()),
        other => other,
    };
    Address::from_value(value)
        .ok_or_else(|| RepositoryError::DataCorruption("address is not a JSON object".to_string()))
}

fn decode_items(value: Value) -> Result<Vec<OrderItem>, RepositoryError> {
    let value = match value {
        Value::String(raw) => serde_json::from_str(&raw).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid items JSON in database: {e}"))
        })?,
        other => other,
    };
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(OrderItem::from_value)
            .collect::<Option<_>>()
            .ok_or_else(|| RepositoryError::DataCorruption("order item is not a JSON object".to_string())),
        Value::Null => Ok(Vec::new()),
        _ => Err(RepositoryError::DataCorruption(
            "order items are not a JSON array".to_string(),
        )),
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<OrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.order_number))
        })?;
        let payment_status = row.payment_status.parse::<PaymentStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.order_number))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            invoice_number: row.invoice_number,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            shipping_address: decode_address(row.shipping_address)?,
            billing_address: row.billing_address.map(decode_address).transpose()?,
            items: decode_items(row.items)?,
            subtotal: row.subtotal,
            shipping: row.shipping,
            tax: row.tax,
            total: row.total,
            discount_code: row.discount_code,
            discount_amount: row.discount_amount,
            coins_used: row.coins_used,
            payment_method: row.payment_method,
            payment_type: row.payment_type,
            payment_status,
            cod: row.cod,
            status,
            tags: row.tags,
            affiliate_id: row.affiliate_id,
            tracking_url: row.tracking_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Internal row type for status history queries.
#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i32,
    order_id: i32,
    old_status: Option<String>,
    new_status: String,
    note: Option<String>,
    changed_by: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for StatusHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            order_id: OrderId::new(row.order_id),
            old_status: row.old_status,
            new_status: row.new_status,
            note: row.note,
            changed_by: row.changed_by,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for cancellation queries.
#[derive(Debug, sqlx::FromRow)]
struct CancellationRow {
    id: i32,
    order_id: i32,
    cancellation_type: String,
    reason: String,
    status: String,
    refund_amount: Decimal,
    processed_by: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CancellationRow> for Cancellation {
    type Error = RepositoryError;

    fn try_from(row: CancellationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: OrderId::new(row.order_id),
            cancellation_type: row.cancellation_type,
            reason: row.reason,
            status: row
                .status
                .parse::<CancellationStatus>()
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?,
            refund_amount: row.refund_amount,
            processed_by: row.processed_by,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Update results
// =============================================================================

/// Result of applying admin changes to an order.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    /// Status before the change.
    pub previous_status: OrderStatus,
    /// The order as stored after the change.
    pub order: Order,
}

impl OrderUpdate {
    /// The new status, when the update changed it.
    #[must_use]
    pub fn status_transition(&self) -> Option<OrderStatus> {
        (self.order.status != self.previous_status).then_some(self.order.status)
    }
}

/// Amounts for one side of a split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSide {
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// What a split writes: the remaining original, the new order, its number.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub keep: SplitSide,
    pub moved: SplitSide,
    pub split_number: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let sql = format!(
            "INSERT INTO orders (order_number, invoice_number, customer_name, customer_email, \
             shipping_address, billing_address, items, subtotal, shipping, tax, total, \
             payment_method, payment_type, payment_status, cod, affiliate_id, discount_code, \
             discount_amount, coins_used) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             RETURNING {ORDER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(&order.order_number)
            .bind(&order.invoice_number)
            .bind(&order.customer_name)
            .bind(&order.customer_email)
            .bind(sqlx::types::Json(&order.shipping_address))
            .bind(order.billing_address.as_ref().map(sqlx::types::Json))
            .bind(sqlx::types::Json(&order.items))
            .bind(order.subtotal)
            .bind(order.shipping)
            .bind(order.tax)
            .bind(order.total)
            .bind(&order.payment_method)
            .bind(&order.payment_type)
            .bind(order.payment_status.as_str())
            .bind(order.cod)
            .bind(&order.affiliate_id)
            .bind(&order.discount_code)
            .bind(order.discount_amount)
            .bind(order.coins_used)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::conflict_on_unique(e, "Order number already exists"))?;

        row.try_into()
    }

    /// Get an order by its database ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get an order by its order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_number)
            .fetch_optional(self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Find an order by order number, falling back to the numeric ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, number_or_id: &str) -> Result<Option<Order>, RepositoryError> {
        if let Some(order) = self.get_by_number(number_or_id).await? {
            return Ok(Some(order));
        }
        if !number_or_id.is_empty()
            && number_or_id.chars().all(|c| c.is_ascii_digit())
            && let Ok(id) = number_or_id.parse::<OrderId>()
        {
            return self.get_by_id(id).await;
        }
        Ok(None)
    }

    /// List orders matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut query = select_orders(filter, Some((limit, offset)));
        let rows = query.build_query_as::<OrderRow>().fetch_all(self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Count orders matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, filter: &OrderFilter) -> Result<i64, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(self.pool).await?;
        Ok(count)
    }

    /// Every order matching `filter` for CSV export, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut query = select_orders(filter, None);
        let rows = query.build_query_as::<OrderRow>().fetch_all(self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Replace an order's tags.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_tags(&self, id: OrderId, tags: &[String]) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE orders SET tags = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(tags)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }

    /// Store the invoice number on an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_invoice_number(
        &self,
        id: OrderId,
        invoice_number: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET invoice_number = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(invoice_number)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Apply whitelisted changes and record status history in one transaction.
    ///
    /// A history row is written when `changes.status` or `note` is supplied;
    /// `old_status` is only filled when the status actually changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update(
        &self,
        id: OrderId,
        changes: &OrderChanges,
        note: Option<&str>,
        changed_by: Option<StaffUserId>,
    ) -> Result<OrderUpdate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let previous_status = previous
            .ok_or(RepositoryError::NotFound)?
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let sql = format!(
            "UPDATE orders SET \
                status = COALESCE($2, status), \
                payment_status = COALESCE($3, payment_status), \
                payment_method = COALESCE($4, payment_method), \
                tracking_url = COALESCE($5, tracking_url), \
                tags = COALESCE($6, tags), \
                cod = COALESCE($7, cod), \
                shipping_address = COALESCE($8, shipping_address), \
                billing_address = COALESCE($9, billing_address), \
                customer_name = COALESCE($10, customer_name), \
                customer_email = COALESCE($11, customer_email), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(changes.status.map(|s| s.as_str()))
            .bind(changes.payment_status.map(|s| s.as_str()))
            .bind(&changes.payment_method)
            .bind(&changes.tracking_url)
            .bind(&changes.tags)
            .bind(changes.cod)
            .bind(changes.shipping_address.as_ref().map(sqlx::types::Json))
            .bind(changes.billing_address.as_ref().map(sqlx::types::Json))
            .bind(&changes.customer_name)
            .bind(&changes.customer_email)
            .fetch_one(&mut *tx)
            .await?;
        let order: Order = row.try_into()?;

        if changes.status.is_some() || note.is_some() {
            let old_status = (order.status != previous_status).then_some(previous_status.as_str());
            sqlx::query(
                "INSERT INTO order_status_history (order_id, old_status, new_status, note, changed_by) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(old_status)
            .bind(order.status.as_str())
            .bind(note)
            .bind(changed_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(OrderUpdate {
            previous_status,
            order,
        })
    }

    /// Set an order's status and append a history row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        note: &str,
        changed_by: Option<StaffUserId>,
    ) -> Result<OrderUpdate, RepositoryError> {
        let changes = OrderChanges {
            status: Some(status),
            ..OrderChanges::default()
        };
        self.update(id, &changes, Some(note), changed_by).await
    }

    /// Status history of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: OrderId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, order_id, old_status, new_status, note, changed_by, created_at \
             FROM order_status_history WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Move items into a new order and shrink the original, in one transaction.
    ///
    /// The original row is locked with `FOR UPDATE` and `plan` computes the
    /// split from that locked copy, so concurrent splits and updates of the
    /// same order serialise instead of overwriting each other.
    ///
    /// # Errors
    ///
    /// Returns the error from `plan`, or a converted `RepositoryError`:
    /// `NotFound` if the original order does not exist, `Conflict` if the
    /// split order number is taken, `Database` if a query fails.
    pub async fn split<F, E>(&self, id: OrderId, plan: F) -> Result<(Order, Order), E>
    where
        F: FnOnce(&Order) -> Result<SplitPlan, E>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let lock_sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let locked: Order = sqlx::query_as::<_, OrderRow>(&lock_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::from)?
            .ok_or(RepositoryError::NotFound)?
            .try_into()?;

        let SplitPlan { keep, moved, split_number } = plan(&locked)?;

        let update_sql = format!(
            "UPDATE orders SET items = $2, subtotal = $3, shipping = $4, tax = $5, total = $6, \
             updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let original: Order = sqlx::query_as::<_, OrderRow>(&update_sql)
            .bind(id)
            .bind(sqlx::types::Json(&keep.items))
            .bind(keep.subtotal)
            .bind(keep.shipping)
            .bind(keep.tax)
            .bind(keep.total)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?
            .try_into()?;

        let insert_sql = format!(
            "INSERT INTO orders (order_number, customer_name, customer_email, shipping_address, \
             billing_address, items, subtotal, shipping, tax, total, payment_method, payment_type, \
             payment_status, cod, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {ORDER_COLUMNS}"
        );
        let split: Order = sqlx::query_as::<_, OrderRow>(&insert_sql)
            .bind(&split_number)
            .bind(&original.customer_name)
            .bind(&original.customer_email)
            .bind(sqlx::types::Json(&original.shipping_address))
            .bind(original.billing_address.as_ref().map(sqlx::types::Json))
            .bind(sqlx::types::Json(&moved.items))
            .bind(moved.subtotal)
            .bind(moved.shipping)
            .bind(moved.tax)
            .bind(moved.total)
            .bind(&original.payment_method)
            .bind(&original.payment_type)
            .bind(original.payment_status.as_str())
            .bind(original.cod)
            .bind(original.status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::conflict_on_unique(e, "Split order number already exists"))?
            .try_into()?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok((original, split))
    }

    /// Record a full cancellation unless a pending or approved one exists.
    ///
    /// Returns `None` when an open cancellation was already on file.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn record_cancellation(
        &self,
        id: OrderId,
        reason: &str,
        refund_amount: Decimal,
        processed_by: Option<StaffUserId>,
    ) -> Result<Option<Cancellation>, RepositoryError> {
        let row = sqlx::query_as::<_, CancellationRow>(
            "INSERT INTO order_cancellations \
                (order_id, cancellation_type, reason, status, refund_amount, processed_by, processed_at) \
             SELECT $1, 'full', $2, 'approved', $3, $4, NOW() \
             WHERE NOT EXISTS ( \
                SELECT 1 FROM order_cancellations \
                WHERE order_id = $1 AND status IN ('pending', 'approved') \
             ) \
             RETURNING id, order_id, cancellation_type, reason, status, refund_amount, processed_by, created_at",
        )
        .bind(id)
        .bind(reason)
        .bind(refund_amount)
        .bind(processed_by)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

/// `SELECT` for orders matching `filter`, newest first, paged when `window`
/// carries a limit and offset.
fn select_orders(
    filter: &OrderFilter,
    window: Option<(i64, i64)>,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
    push_filter(&mut query, filter);
    query.push(" ORDER BY created_at DESC");
    if let Some((limit, offset)) = window {
        query.push(" LIMIT ").push_bind(limit);
        query.push(" OFFSET ").push_bind(offset);
    }
    query
}

/// Append the `WHERE` clause for `filter`.
fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    let mut separated = false;
    let mut next = |query: &mut QueryBuilder<'_, Postgres>| {
        query.push(if separated { " AND " } else { " WHERE " });
        separated = true;
    };

    if let Some(status) = filter.status {
        next(query);
        query.push("status = ").push_bind(status.as_str());
    }
    if let Some(payment_status) = filter.payment_status {
        next(query);
        query
            .push("payment_status = ")
            .push_bind(payment_status.as_str());
    }
    if let Some(cod) = filter.cod {
        next(query);
        query.push("COALESCE(cod, FALSE) = ").push_bind(cod);
    }
    if let Some(customer) = &filter.customer {
        let pattern = super::like_pattern(customer);
        next(query);
        query
            .push("(customer_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(q) = &filter.query {
        next(query);
        query
            .push("order_number ILIKE ")
            .push_bind(super::like_pattern(q));
    }
    if let Some(from) = filter.from {
        next(query);
        query.push("created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        next(query);
        query.push("created_at <= ").push_bind(to);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_push_filter_builds_where_clause() {
        let filter = OrderFilter {
            status: Some(OrderStatus::Shipped),
            cod: Some(true),
            customer: Some("asha".to_string()),
            ..OrderFilter::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut query, &filter);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM orders WHERE status = $1 AND COALESCE(cod, FALSE) = $2 \
             AND (customer_name ILIKE $3 OR customer_email ILIKE $4)"
        );
    }

    #[test]
    fn test_push_filter_empty() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut query, &OrderFilter::default());
        assert_eq!(query.sql(), "SELECT COUNT(*) FROM orders");
    }

    #[test]
    fn test_export_query_is_not_paged() {
        let filter = OrderFilter {
            status: Some(OrderStatus::Delivered),
            ..OrderFilter::default()
        };

        let export = select_orders(&filter, None);
        assert!(export.sql().ends_with("WHERE status = $1 ORDER BY created_at DESC"));
        assert!(!export.sql().contains("LIMIT"));

        let page = select_orders(&filter, Some((50, 100)));
        assert!(page.sql().ends_with("ORDER BY created_at DESC LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn test_decode_address_from_string() {
        let address = decode_address(json!("{\"city\":\"Lucknow\"}")).unwrap();
        assert_eq!(address.city().as_deref(), Some("Lucknow"));
        assert!(decode_address(json!([1, 2])).is_err());
        assert_eq!(decode_address(Value::Null).unwrap(), Address::default());
    }

    #[test]
    fn test_decode_items_rejects_non_objects() {
        let items = decode_items(json!([{"name": "Serum"}, {"name": "Toner"}])).unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(
            decode_items(json!([{"name": "Serum"}, 7])),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(decode_items(json!({"name": "Serum"})).is_err());
    }
}
