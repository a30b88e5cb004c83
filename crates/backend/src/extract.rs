//! Request extractors whose rejections render as [`AppError`].
//!
//! Handlers import `Json`, `Query` and `Path` from here instead of axum so a
//! malformed body, query string or path segment still answers with the
//! `{"error": ...}` body.

use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// JSON body extractor and response.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameter extractor.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct Checkout {
        coins_used: Option<i32>,
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        page: Option<i64>,
    }

    fn app() -> Router {
        Router::new()
            .route("/checkout", post(|Json(body): Json<Checkout>| async move { Json(body) }))
            .route(
                "/orders",
                get(|Query(q): Query<Paging>| async move { q.page.unwrap_or(1).to_string() }),
            )
            .route("/orders/{id}", get(|Path(id): Path<i32>| async move { id.to_string() }))
    }

    async fn error_of(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_wrong_json_type_is_json_bad_request() {
        let (status, body) = error_of(
            Request::post("/checkout")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"coins_used": "5"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("coins_used"));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_json_bad_request() {
        let (status, body) =
            error_of(Request::post("/checkout").body(Body::from("{}")).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_bad_query_and_path_are_json_bad_request() {
        let (status, _) = error_of(Request::get("/orders?page=two").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_of(Request::get("/orders/abc").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_requests_pass_through() {
        let response = app()
            .oneshot(
                Request::post("/checkout")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"coins_used": 5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"coins_used":5}"#);
    }
}
