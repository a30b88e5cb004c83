//! Staff authentication extractors.
//!
//! Staff send `Authorization: Bearer staff_…`. The token is resolved against
//! `staff_sessions` on every request; revoked, expired and inactive accounts
//! are rejected with 401.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use nefol_core::Permission;

use crate::error::{AppError, set_sentry_user};
use crate::models::{ClientInfo, StaffContext};
use crate::services::auth::StaffAuthService;
use crate::state::AppState;

/// The bearer token of a request, if any.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Client address and user agent, preferring proxy headers.
#[must_use]
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip = header_text("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_text("x-real-ip"))
        .map(String::from);

    ClientInfo {
        ip,
        user_agent: header_text(header::USER_AGENT.as_str()).map(String::from),
    }
}

/// Fail with 403 unless the staff member holds `permission`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` when the permission is missing.
pub fn require_permission(staff: &StaffContext, permission: Permission) -> Result<(), AppError> {
    if staff.has(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Missing permission: {}", permission.code())))
    }
}

/// Request metadata for audit logging.
pub struct Client(pub ClientInfo);

impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_info(&parts.headers)))
    }
}

/// Extractor that requires an authenticated staff member.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireStaff { staff, .. }: RequireStaff) -> impl IntoResponse {
///     format!("Hello, {}!", staff.name)
/// }
/// ```
pub struct RequireStaff {
    pub staff: StaffContext,
    /// The bearer token that authenticated the request.
    pub token: String,
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?
            .to_string();

        let staff = StaffAuthService::new(state.pool())
            .context_for_token(&token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        set_sentry_user(staff.id.as_i32(), staff.email.as_str());
        Ok(Self { staff, token })
    }
}

/// Extractor that resolves a staff member when a valid token is present.
///
/// Missing or invalid tokens yield `None`; the storefront uses the same
/// endpoints anonymously.
pub struct OptionalStaff(pub Option<StaffContext>);

impl FromRequestParts<AppState> for OptionalStaff {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Self(None));
        };
        let staff = StaffAuthService::new(state.pool()).context_for_token(token).await?;
        Ok(Self(staff))
    }
}

/// Extractor that requires the `admin` role.
pub struct RequireAdmin(pub StaffContext);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireStaff { staff, .. } = RequireStaff::from_request_parts(parts, state).await?;
        if !staff.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(staff))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use nefol_core::{Email, StaffUserId};

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            bearer_token(&headers(&[("authorization", "Bearer staff_abc")])),
            Some("staff_abc")
        );
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic xyz")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer  ")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let info = client_info(&headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
            ("user-agent", "curl/8.0"),
        ]));
        assert_eq!(info.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));

        let info = client_info(&headers(&[("x-real-ip", "10.0.0.2")]));
        assert_eq!(info.ip.as_deref(), Some("10.0.0.2"));
        assert!(info.user_agent.is_none());
    }

    #[test]
    fn test_require_permission() {
        let staff = StaffContext {
            id: StaffUserId::new(3),
            name: "Ravi".to_string(),
            email: Email::parse("ravi@thenefol.com").unwrap(),
            roles: vec!["staff".to_string()],
            permissions: ["orders:read".to_string()].into_iter().collect(),
            page_permissions: vec![],
        };

        assert!(require_permission(&staff, Permission::OrdersRead).is_ok());
        let err = require_permission(&staff, Permission::UsersUpdate).unwrap_err();
        assert_eq!(err.to_string(), "Missing permission: users:update");
    }
}
