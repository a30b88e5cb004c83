//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` with the `http_request` span
//! 3. Request ID
//! 4. CORS
//!
//! Authentication is per handler through the extractors in [`auth`].

pub mod auth;
pub mod request_id;

pub use auth::{Client, OptionalStaff, RequireAdmin, RequireStaff, require_permission};
pub use request_id::request_id_middleware;
