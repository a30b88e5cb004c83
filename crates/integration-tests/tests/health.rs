//! Liveness, request ids and CORS through the full middleware stack.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};

use nefol_integration_tests::{offline_app, send, text_body};

#[tokio::test]
async fn test_health_returns_ok() {
    let response = send(
        offline_app(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(text_body(response).await, "ok");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let response = send(
        offline_app(),
        Request::builder()
            .uri("/health")
            .header("x-request-id", "checkout-42")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.headers()["x-request-id"], "checkout-42");
}

#[tokio::test]
async fn test_cors_preflight_allows_authorization() {
    let response = send(
        offline_app(),
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/orders")
            .header("origin", "https://admin.thenefol.com")
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", "authorization")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = send(
        offline_app(),
        Request::builder().uri("/api/nope").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
