//! Unified error handling for the REST API.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::alerts::AlertError;
use crate::services::auth::StaffAuthError;
use crate::services::email::EmailError;
use crate::services::invoice::InvoiceError;
use crate::services::orders::OrderError;
use crate::services::whatsapp::WhatsAppError;
use crate::shiprocket::ShiprocketError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Shiprocket API operation failed.
    #[error("Shiprocket error: {0}")]
    Shiprocket(#[from] ShiprocketError),

    /// Sending an email failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Sending a WhatsApp message failed.
    #[error("WhatsApp error: {0}")]
    WhatsApp(#[from] WhatsAppError),

    /// Invoice rendering failed.
    #[error("Invoice error: {0}")]
    Invoice(#[from] InvoiceError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Request conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// A required local dependency (e.g. the PDF renderer) is unavailable.
    #[error("{0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Invoice(InvoiceError::RendererUnavailable(_)) | Self::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Database(_) | Self::Internal(_) | Self::Invoice(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Shiprocket(
                ShiprocketError::NotConfigured | ShiprocketError::AuthenticationFailed(_),
            ) => StatusCode::BAD_REQUEST,
            Self::Shiprocket(ShiprocketError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Shiprocket(_) | Self::Email(_) | Self::WhatsApp(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the client. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Invoice(InvoiceError::RendererUnavailable(_)) => {
                "PDF generation is unavailable".to_string()
            }
            Self::Database(_) | Self::Internal(_) | Self::Invoice(_) => {
                "Internal server error".to_string()
            }
            Self::Shiprocket(
                ShiprocketError::NotConfigured | ShiprocketError::AuthenticationFailed(_),
            ) => "Invalid Shiprocket credentials".to_string(),
            Self::Shiprocket(ShiprocketError::NotFound(what)) => format!("{what} not found"),
            Self::Shiprocket(_) => "Shiprocket request failed".to_string(),
            Self::Email(_) => "Failed to send email".to_string(),
            Self::WhatsApp(_) => "Failed to send WhatsApp message".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<AlertError> for AppError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::NotConfigured(channel) => {
                Self::BadRequest(format!("{channel} is not configured"))
            }
            AlertError::Email(e) => Self::Email(e),
            AlertError::WhatsApp(e) => Self::WhatsApp(e),
            AlertError::Database(e) => Self::Database(e),
        }
    }
}

impl From<StaffAuthError> for AppError {
    fn from(err: StaffAuthError) -> Self {
        match err {
            StaffAuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            StaffAuthError::InvalidEmail(_)
            | StaffAuthError::WeakPassword(_)
            | StaffAuthError::PasswordMismatch
            | StaffAuthError::WrongCurrentPassword
            | StaffAuthError::MissingField(_) => Self::BadRequest(err.to_string()),
            StaffAuthError::StaffAlreadyExists => Self::Conflict(err.to_string()),
            StaffAuthError::StaffNotFound | StaffAuthError::RoleNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            StaffAuthError::PasswordHash => Self::Internal(err.to_string()),
            StaffAuthError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::MissingFields
            | OrderError::InvalidTotal
            | OrderError::InvalidField(_)
            | OrderError::NoFieldsToUpdate
            | OrderError::NoItemIndexes
            | OrderError::NothingToMove
            | OrderError::EmailDisabled => Self::BadRequest(err.to_string()),
            OrderError::NotFound => Self::NotFound(err.to_string()),
            OrderError::Repository(e) => Self::Database(e),
            OrderError::Invoice(e) => Self::Invoice(e),
            OrderError::Email(e) => Self::Email(e),
        }
    }
}

// Extractor rejections keep axum's message but use the JSON error body.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server and upstream errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Set the Sentry user context from a staff member.
pub fn set_sentry_user(staff_id: i32, email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(staff_id.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Order not found".to_string());
        assert_eq!(err.to_string(), "Order not found");

        let err = AppError::BadRequest("Missing required fields".to_string());
        assert_eq!(err.to_string(), "Missing required fields");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized(String::new()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden(String::new()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::BadRequest(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unavailable(String::new()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(RepositoryError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Invoice(InvoiceError::RendererUnavailable("chromium".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_alert_errors_map_to_channels() {
        let err: AppError = AlertError::NotConfigured("WhatsApp").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "WhatsApp is not configured");

        let err: AppError = AlertError::WhatsApp(WhatsAppError::Unauthorized).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_staff_auth_errors() {
        let err: AppError = StaffAuthError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid credentials");

        let err: AppError = StaffAuthError::StaffAlreadyExists.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = StaffAuthError::WrongCurrentPassword.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_order_errors() {
        let err: AppError = OrderError::InvalidTotal.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid total amount");

        let err: AppError = OrderError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = OrderError::Repository(RepositoryError::NotFound).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shiprocket_credentials_error_is_client_error() {
        let (status, body) = body_json(AppError::Shiprocket(ShiprocketError::NotConfigured)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid Shiprocket credentials");

        let (status, body) =
            body_json(AppError::Shiprocket(ShiprocketError::NotFound("Shipment".into()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Shipment not found");

        let (status, _) = body_json(AppError::Shiprocket(ShiprocketError::TokenExpired)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_body_is_json_error() {
        let (status, body) = body_json(AppError::BadRequest("No fields to update".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No fields to update");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) =
            body_json(AppError::Database(RepositoryError::DataCorruption("bad row 7".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
