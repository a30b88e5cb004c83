//! Customer account endpoints kept for the storefront contract.

use axum::{Router, routing::get};
use serde_json::Value;

use crate::extract::Json;
use crate::state::AppState;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/users/saved-cards", get(saved_cards))
}

/// Cards are stored by the payment gateway, never here.
async fn saved_cards() -> Json<Vec<Value>> {
    Json(Vec::new())
}
