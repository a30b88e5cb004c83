//! HTTP routes for the NEFOL backend.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                - Liveness
//! GET  /health/ready                          - Readiness (database)
//!
//! # Orders
//! POST /api/orders                            - Checkout (public)
//! GET  /api/orders                            - List (orders:read)
//! GET  /api/orders/export                     - CSV export (orders:read)
//! GET  /api/orders/{order_number}             - Detail (staff or ?email=)
//! PUT  /api/orders/{id}                       - Update (orders:update)
//! POST /api/orders/{id}/tags                  - Replace tags (orders:update)
//! POST /api/orders/{id}/split                 - Split items out (orders:update)
//! GET  /api/orders/{id}/invoice               - Invoice HTML (invoices:read)
//! GET  /api/orders/{id}/invoice.pdf           - Invoice PDF (invoices:read)
//! POST /api/orders/{id}/invoice/email         - Re-send invoice (invoices:read)
//! GET  /api/invoice-settings                  - Invoice settings (invoices:read)
//! PUT  /api/invoice-settings                  - Save settings (users:update)
//!
//! # Alerts and notifications
//! GET  /api/alerts/config                     - Masked alert config (users:read)
//! POST /api/alerts/config                     - Save alert config (users:update)
//! POST /api/alerts/test/{whatsapp,email}      - Test sends (users:update)
//! POST /api/notifications/order               - Admin alert for an order
//! GET  /api/admin/notifications               - Feed (staff)
//! GET  /api/admin/notifications/unread-count  - Unread count (staff)
//! PUT  /api/admin/notifications/{id}/read     - Mark read (staff)
//!
//! # Staff
//! POST /api/staff/auth/{login,logout,change-password}, GET /api/staff/auth/me
//! /api/staff/{roles,permissions,role-permissions,users,...} - Admin only
//!
//! # Shiprocket
//! /api/shiprocket/{config,orders/{id}/shipment,orders/{id}/awb,...}
//!
//! # Storefront
//! GET  /api/users/saved-cards                 - Always empty
//! ```

pub mod alerts;
pub mod health;
pub mod invoice_settings;
pub mod orders;
pub mod shiprocket;
pub mod staff;
pub mod users;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create all routes for the backend.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(invoice_settings::router())
        .merge(alerts::router())
        .merge(staff::router())
        .merge(shiprocket::router())
        .merge(users::router())
}

/// The complete application: routes, CORS, request ids and request tracing.
///
/// Sentry layers are added by the binary around this router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_allowed_origins);

    routes()
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        #[allow(clippy::cast_possible_truncation)]
                        span.record("latency_ms", latency.as_millis() as u64);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// CORS for the admin panel and storefront origins. No origins means any.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

/// End of a calendar day, for inclusive `to` filters.
pub(crate) fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date at `time` (UTC).
pub(crate) fn parse_date_bound(value: &str, time: NaiveTime) -> Result<DateTime<Utc>, AppError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(time).and_utc())
        .map_err(|_| AppError::BadRequest(format!("Invalid date: {value}")))
}
