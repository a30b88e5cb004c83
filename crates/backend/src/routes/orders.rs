//! Order endpoints: checkout, admin listing, updates, splits and invoices.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use nefol_core::{OrderId, OrderStatus, PaymentStatus, Permission};

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{OptionalStaff, RequireStaff, require_permission};
use crate::models::{Order, OrderFilter, StatusHistoryEntry};
use crate::services::invoice::{prepare_invoice, render_html};
use crate::services::orders::{
    self, CreateOrderRequest, OrderError, UpdateOrderRequest, orders_csv, page_window,
};
use crate::state::AppState;

use super::{end_of_day, parse_date_bound};

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list).post(create))
        .route("/api/orders/export", get(export))
        .route("/api/orders/{order}", get(show).put(update))
        .route("/api/orders/{order}/tags", post(set_tags))
        .route("/api/orders/{order}/split", post(split))
        .route("/api/orders/{order}/invoice", get(invoice_html))
        .route("/api/orders/{order}/invoice.pdf", get(invoice_pdf))
        .route("/api/orders/{order}/invoice/email", post(email_invoice))
}

// =============================================================================
// Query and response types
// =============================================================================

/// Listing and export filters as they arrive on the query string.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub cod: Option<String>,
    pub customer: Option<String>,
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl OrderListQuery {
    /// Convert into a repository filter.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown status or a malformed date.
    pub fn filter(&self) -> Result<OrderFilter, AppError> {
        let status = non_empty(self.status.as_deref())
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let payment_status = non_empty(self.payment_status.as_deref())
            .map(str::parse::<PaymentStatus>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(OrderFilter {
            status,
            payment_status,
            cod: non_empty(self.cod.as_deref()).map(|v| v == "true"),
            customer: non_empty(self.customer.as_deref()).map(String::from),
            query: non_empty(self.q.as_deref()).map(String::from),
            from: non_empty(self.from.as_deref())
                .map(|v| parse_date_bound(v, NaiveTime::MIN))
                .transpose()?,
            to: non_empty(self.to.as_deref())
                .map(|v| parse_date_bound(v, end_of_day()))
                .transpose()?,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One page of orders.
#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// An order with its status history.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    #[serde(default)]
    pub item_indexes: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct SplitResponse {
    pub original: Order,
    pub split: Order,
}

#[derive(Debug, Serialize)]
pub struct InvoiceEmailResponse {
    pub sent: bool,
    pub invoice_number: String,
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse::<OrderId>()
        .map_err(|_| AppError::BadRequest("Invalid order id".to_string()))
}

async fn load_order(state: &AppState, raw: &str) -> Result<Order, AppError> {
    let id = parse_order_id(raw)?;
    OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or(AppError::from(OrderError::NotFound))
}

/// Whether an anonymous caller's `?email=` matches the order's customer.
fn email_matches(order: &Order, email: Option<&str>) -> bool {
    email
        .map(str::trim)
        .is_some_and(|e| !e.is_empty() && order.belongs_to(e))
}

// =============================================================================
// Handlers
// =============================================================================

/// Storefront checkout.
#[instrument(skip(state, request))]
async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = orders::create_order(&state, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(state, staff))]
async fn list(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderPage>, AppError> {
    require_permission(&staff, Permission::OrdersRead)?;
    let filter = query.filter()?;
    let (page, limit, offset) = page_window(query.page, query.limit);

    let repo = OrderRepository::new(state.pool());
    let items = repo.list(&filter, limit, offset).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(OrderPage {
        items,
        page,
        limit,
        total,
    }))
}

#[instrument(skip(state, staff))]
async fn export(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, AppError> {
    require_permission(&staff, Permission::OrdersRead)?;
    let filter = query.filter()?;
    let rows = OrderRepository::new(state.pool()).export(&filter).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
        ],
        orders_csv(&rows),
    )
        .into_response())
}

/// Order detail by order number (or numeric id).
///
/// Staff with `orders:read` see any order; everyone else must supply the
/// customer email, and a mismatch looks exactly like a missing order.
#[instrument(skip(state, staff, query))]
async fn show(
    OptionalStaff(staff): OptionalStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<OrderDetail>, AppError> {
    let repo = OrderRepository::new(state.pool());
    let order = repo.find(&order).await?.ok_or(OrderError::NotFound)?;

    let staff_can_read = staff.as_ref().is_some_and(|s| s.has(Permission::OrdersRead));
    if !staff_can_read && !email_matches(&order, query.email.as_deref()) {
        return Err(OrderError::NotFound.into());
    }

    let history = repo.history(order.id).await?;
    Ok(Json(OrderDetail { order, history }))
}

#[instrument(skip(state, staff, request))]
async fn update(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    require_permission(&staff, Permission::OrdersUpdate)?;
    let id = parse_order_id(&order)?;
    let order = orders::update_order(&state, id, request, Some(staff.id)).await?;
    Ok(Json(order))
}

#[instrument(skip(state, staff, request))]
async fn set_tags(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
    Json(request): Json<TagsRequest>,
) -> Result<Json<Order>, AppError> {
    require_permission(&staff, Permission::OrdersUpdate)?;
    let id = parse_order_id(&order)?;

    let Some(Value::Array(values)) = request.tags else {
        return Err(AppError::BadRequest("tags must be an array".to_string()));
    };
    let tags: Vec<String> = values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    let order = OrderRepository::new(state.pool())
        .set_tags(id, &tags)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => AppError::from(OrderError::NotFound),
            other => other.into(),
        })?;
    Ok(Json(order))
}

#[instrument(skip(state, staff, request))]
async fn split(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
    Json(request): Json<SplitRequest>,
) -> Result<(StatusCode, Json<SplitResponse>), AppError> {
    require_permission(&staff, Permission::OrdersUpdate)?;
    let id = parse_order_id(&order)?;
    let (original, split) = orders::split_order(&state, id, &request.item_indexes).await?;
    Ok((StatusCode::CREATED, Json(SplitResponse { original, split })))
}

#[instrument(skip(state, staff))]
async fn invoice_html(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
) -> Result<Html<String>, AppError> {
    require_permission(&staff, Permission::InvoicesRead)?;
    let order = load_order(&state, &order).await?;
    let view = prepare_invoice(state.pool(), &order, &state.config().public_base_url).await?;
    Ok(Html(render_html(&view)?))
}

#[instrument(skip(state, staff))]
async fn invoice_pdf(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
) -> Result<Response, AppError> {
    require_permission(&staff, Permission::InvoicesRead)?;
    let order = load_order(&state, &order).await?;
    let view = prepare_invoice(state.pool(), &order, &state.config().public_base_url).await?;
    let pdf = state.pdf().render(&render_html(&view)?).await?;

    let disposition = format!("inline; filename=\"invoice-{}.pdf\"", view.invoice_number);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

#[instrument(skip(state, staff))]
async fn email_invoice(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order): Path<String>,
) -> Result<Json<InvoiceEmailResponse>, AppError> {
    require_permission(&staff, Permission::InvoicesRead)?;
    let order = load_order(&state, &order).await?;
    let invoice_number = orders::email_invoice(&state, &order).await?;
    Ok(Json(InvoiceEmailResponse {
        sent: true,
        invoice_number,
    }))
}
