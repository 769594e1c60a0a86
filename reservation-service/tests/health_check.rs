mod common;

use axum::http::StatusCode;
use common::{body_json, spawn_app};

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "reservation-service-test");
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = spawn_app().await;
    app.get("/health", None).await;

    let response = app.get("/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let app = spawn_app().await;
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-123")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}
