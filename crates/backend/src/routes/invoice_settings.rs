//! Invoice settings endpoints.

use axum::{Router, extract::State, routing::get};
use tracing::instrument;

use nefol_core::Permission;

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::{RequireStaff, require_permission};
use crate::services::invoice::{InvoiceSettings, InvoiceSettingsUpdate};
use crate::state::AppState;

/// Build the invoice settings router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/invoice-settings", get(show).put(update))
}

async fn show(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<InvoiceSettings>, AppError> {
    require_permission(&staff, Permission::InvoicesRead)?;
    let settings = InvoiceSettings::load(state.pool(), &state.config().public_base_url).await?;
    Ok(Json(settings))
}

/// Save the supplied sections and return the effective settings.
#[instrument(skip_all)]
async fn update(
    RequireStaff { staff, .. }: RequireStaff,
    State(state): State<AppState>,
    Json(request): Json<InvoiceSettingsUpdate>,
) -> Result<Json<InvoiceSettings>, AppError> {
    require_permission(&staff, Permission::UsersUpdate)?;
    InvoiceSettings::save(state.pool(), &request).await?;
    let settings = InvoiceSettings::load(state.pool(), &state.config().public_base_url).await?;
    Ok(Json(settings))
}
