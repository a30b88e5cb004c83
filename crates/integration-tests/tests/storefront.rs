//! Public storefront endpoints that answer without the database.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};

use nefol_integration_tests::{json_body, offline_app, send};

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_saved_cards_is_always_empty() {
    let request = Request::builder()
        .uri("/api/users/saved-cards")
        .body(Body::empty())
        .unwrap();

    let response = send(offline_app(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_checkout_rejects_missing_fields() {
    let body = json!({
        "customer_name": "Asha Verma",
        "items": [{"name": "Face Serum", "price": 499}],
        "total": 499
    });

    let response = send(offline_app(), post_json("/api/orders", &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Missing required fields");
}

#[tokio::test]
async fn test_checkout_rejects_negative_total() {
    let body = json!({
        "customer_name": "Asha Verma",
        "customer_email": "asha@example.com",
        "shipping_address": {"address": "12 MG Road", "city": "Lucknow", "pincode": "226001"},
        "items": [{"name": "Face Serum", "price": 499}],
        "total": -1
    });

    let response = send(offline_app(), post_json("/api/orders", &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid total amount");
}

#[tokio::test]
async fn test_order_alert_needs_an_order_reference() {
    let response = send(offline_app(), post_json("/api/notifications/order", &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_with_mistyped_fields_gets_json_error() {
    for body in [json!({"coins_used": "5"}), json!({"cod": "true"})] {
        let response = send(offline_app(), post_json("/api/orders", &body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_checkout_without_json_content_type_gets_json_error() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/orders")
        .body(Body::from("{}"))
        .unwrap();

    let response = send(offline_app(), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}
