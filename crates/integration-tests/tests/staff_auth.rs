//! Bearer token enforcement on staff-only endpoints.
//!
//! Missing and malformed tokens are rejected before any database lookup.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};

use nefol_integration_tests::{json_body, offline_app, send};

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    for uri in [
        "/api/orders",
        "/api/orders/export",
        "/api/staff/auth/me",
        "/api/staff/users",
        "/api/staff/activity",
        "/api/shiprocket/config",
        "/api/shiprocket/shipments",
        "/api/alerts/config",
        "/api/admin/notifications",
        "/api/invoice-settings",
    ] {
        let response = send(offline_app(), get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let body = json_body(response).await;
        assert_eq!(body["error"], "Authentication required", "{uri}");
    }
}

#[tokio::test]
async fn test_malformed_token_is_rejected() {
    for token in ["not-a-staff-token", "staff_123", "user_abcdef"] {
        let response = send(offline_app(), get("/api/staff/auth/me", Some(token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{token}");

        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid or expired token");
    }
}

#[tokio::test]
async fn test_logout_requires_a_token() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/staff/auth/logout")
        .body(Body::empty())
        .unwrap();

    let response = send(offline_app(), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
