//! Shiprocket configuration and shipment endpoints.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument};

use nefol_core::{OrderId, OrderStatus, Permission, ShipmentStatus};

use crate::db::{OrderRepository, RepositoryError, ShipmentRepository};
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{RequireAdmin, RequireStaff, require_permission};
use crate::models::{Order, Shipment, ShipmentSummary};
use crate::services::orders::OrderError;
use crate::shiprocket::{self, ShiprocketError};
use crate::state::AppState;

/// Build the Shiprocket router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/shiprocket/config", get(get_config).post(save_config))
        .route("/api/shiprocket/orders/{order_id}/shipment", post(create_shipment))
        .route("/api/shiprocket/orders/{order_id}/awb", post(awb_and_label))
        .route("/api/shiprocket/orders/{order_id}/track", get(track))
        .route("/api/shiprocket/shipments", get(list_shipments))
        .route("/api/shiprocket/serviceability", get(serviceability))
        .route("/api/shiprocket/manifest", post(manifest))
        .route("/api/shiprocket/pickup", post(schedule_pickup))
        .route("/api/shiprocket/ndr", get(list_ndr))
        .route("/api/shiprocket/ndr/{awb}/action", post(ndr_action))
        .route("/api/shiprocket/rto/{order_id}", post(mark_rto))
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub email: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub has_config: bool,
    pub config: Option<ConfigSummary>,
}

#[derive(Debug, Deserialize)]
pub struct SaveConfigRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub shipment: Shipment,
    pub shiprocket: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceabilityQuery {
    pub pickup_postcode: Option<String>,
    pub delivery_postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRequest {
    pub order_ids: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PickupRequest {
    pub pickup_date: Option<String>,
    #[serde(rename = "orderIds")]
    pub order_ids: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NdrQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NdrActionRequest {
    pub action: Option<String>,
    pub note: Option<String>,
}

/// Number of order ids in a manifest or pickup request.
///
/// # Errors
///
/// Returns `AppError::BadRequest` unless `order_ids` is a non-empty array.
fn order_id_count(order_ids: Option<&Value>) -> Result<usize, AppError> {
    match order_ids {
        Some(Value::Array(ids)) if !ids.is_empty() => Ok(ids.len()),
        _ => Err(AppError::BadRequest("orderIds required".to_string())),
    }
}

fn required(value: Option<&str>, name: &str) -> Result<String, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::BadRequest(format!("{name} required")))
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

// =============================================================================
// Configuration
// =============================================================================

async fn get_config(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ConfigResponse>, AppError> {
    let config = ShipmentRepository::new(state.pool())
        .active_credentials()
        .await?
        .map(|c| ConfigSummary {
            email: c.email,
            is_active: true,
            updated_at: c.updated_at,
        });

    Ok(Json(ConfigResponse {
        has_config: config.is_some(),
        config,
    }))
}

/// Store new credentials and verify them by logging in.
#[instrument(skip(state, _admin, request), fields(email = %request.email))]
async fn save_config(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<SaveConfigRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let email = required(Some(&request.email), "email")?;
    if request.password.is_empty() {
        return Err(AppError::BadRequest("password required".to_string()));
    }
    let password = SecretString::from(request.password);

    ShipmentRepository::new(state.pool())
        .save_credentials(&email, &password)
        .await?;
    state.shiprocket().clear_token().await;
    state.shiprocket().verify_credentials(&email, &password).await?;

    info!("Shiprocket credentials saved");
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "email": email }))))
}

// =============================================================================
// Shipments
// =============================================================================

#[instrument(skip(state, staff))]
async fn create_shipment(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<ShipmentResponse>), AppError> {
    require_permission(&staff, Permission::OrdersUpdate)?;
    let order = load_order(&state, &order_id).await?;
    let outcome = shiprocket::create_shipment(state.shiprocket(), state.pool(), &order).await?;

    Ok((
        StatusCode::CREATED,
        Json(ShipmentResponse {
            shipment: outcome.shipment,
            shiprocket: outcome.response,
        }),
    ))
}

#[instrument(skip(state, staff))]
async fn awb_and_label(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Shipment>, AppError> {
    require_permission(&staff, Permission::OrdersUpdate)?;
    let id = parse_order_id(&order_id)?;

    match shiprocket::awb_and_label(state.shiprocket(), state.pool(), id).await {
        Ok(shipment) => Ok(Json(shipment)),
        Err(ShiprocketError::NotFound(_)) => Err(AppError::BadRequest(
            "No Shiprocket shipment for this order".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, staff))]
async fn track(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::OrdersRead)?;
    let id = parse_order_id(&order_id)?;

    let awb = ShipmentRepository::new(state.pool())
        .for_order(id)
        .await?
        .and_then(|s| s.awb_code)
        .ok_or_else(|| AppError::NotFound("Shipment not found".to_string()))?;

    Ok(Json(state.shiprocket().track_awb(&awb).await?))
}

async fn list_shipments(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Vec<ShipmentSummary>>, AppError> {
    require_permission(&staff, Permission::ShippingRead)?;
    Ok(Json(ShipmentRepository::new(state.pool()).list().await?))
}

#[instrument(skip(state, staff))]
async fn serviceability(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ServiceabilityQuery>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::ShippingRead)?;
    let pickup = required(query.pickup_postcode.as_deref(), "pickup_postcode")?;
    let delivery = required(query.delivery_postcode.as_deref(), "delivery_postcode")?;

    Ok(Json(state.shiprocket().serviceability(&pickup, &delivery).await?))
}

// =============================================================================
// Manifests, pickups, NDR and RTO
// =============================================================================

// TODO: call Shiprocket's manifest and pickup batch endpoints once the label
// workflow moves to batches; both only validate and acknowledge today.
async fn manifest(
    RequireStaff { staff, .. }: RequireStaff,
    Json(request): Json<ManifestRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::ShippingUpdate)?;
    let count = order_id_count(request.order_ids.as_ref())?;
    Ok(Json(json!({ "ok": true, "count": count })))
}

async fn schedule_pickup(
    RequireStaff { staff, .. }: RequireStaff,
    Json(request): Json<PickupRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::ShippingUpdate)?;
    let pickup_date = required(request.pickup_date.as_deref(), "pickup_date")?;
    let count = order_id_count(request.order_ids.as_ref())?;
    Ok(Json(json!({
        "ok": true,
        "scheduled": true,
        "pickup_date": pickup_date,
        "count": count,
    })))
}

async fn list_ndr(
    RequireStaff { staff, .. }: RequireStaff,
    Query(query): Query<NdrQuery>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::ShippingRead)?;
    Ok(Json(json!({ "items": [], "from": query.from, "to": query.to })))
}

async fn ndr_action(
    RequireStaff { staff, .. }: RequireStaff,
    Path(awb): Path<String>,
    Json(request): Json<NdrActionRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::ShippingUpdate)?;
    let action = required(request.action.as_deref(), "action")?;
    Ok(Json(json!({
        "ok": true,
        "awb": awb,
        "action": action,
        "note": request.note,
        "status": "submitted",
    })))
}

/// Mark an order as returned to origin.
#[instrument(skip(state, staff))]
async fn mark_rto(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_permission(&staff, Permission::ShippingUpdate)?;
    let id = parse_order_id(&order_id)?;

    OrderRepository::new(state.pool())
        .set_status(id, OrderStatus::Rto, "Marked RTO", Some(staff.id))
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::from(OrderError::NotFound),
            other => other.into(),
        })?;

    if let Err(e) = ShipmentRepository::new(state.pool())
        .set_status(id, ShipmentStatus::Rto)
        .await
    {
        tracing::warn!(error = %e, "Failed to mark shipment RTO");
    }

    Ok(Json(json!({ "orderId": id, "status": OrderStatus::Rto.as_str() })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_count() {
        assert_eq!(order_id_count(Some(&json!([1, 2, 3]))).unwrap(), 3);
        assert!(order_id_count(Some(&json!([]))).is_err());
        assert!(order_id_count(Some(&json!("1,2"))).is_err());
        assert!(order_id_count(None).is_err());
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required(Some(" 226001 "), "pickup_postcode").unwrap(), "226001");
        let err = required(Some(""), "pickup_postcode").unwrap_err();
        assert_eq!(err.to_string(), "pickup_postcode required");
        assert!(required(None, "action").is_err());
    }

    #[test]
    fn test_pickup_request_field_names() {
        let request: PickupRequest =
            serde_json::from_str(r#"{"pickup_date":"2025-02-01","orderIds":[7]}"#).unwrap();
        assert_eq!(request.pickup_date.as_deref(), Some("2025-02-01"));
        assert_eq!(order_id_count(request.order_ids.as_ref()).unwrap(), 1);
    }
}
