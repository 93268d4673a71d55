mod test_support;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use test_support::{spawn_app, spawn_app_with, RecordingMailer};

#[tokio::test]
async fn wrong_method_returns_coded_405() {
    let app = spawn_app();
    let resp = app.get("/api/auth/register", None).await;
    assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.code(), "method_not_allowed");
    assert_eq!(resp.body["error"], "Method not allowed");
    assert!(resp.headers.get(header::ALLOW).is_some());

    let req = Request::builder()
        .method(Method::PATCH)
        .uri("/api/admin/users")
        .header(header::ACCEPT_LANGUAGE, "ar")
        .body(Body::empty())
        .expect("request");
    let arabic = app.send(req).await;
    assert_eq!(arabic.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(arabic.code(), "method_not_allowed");
    assert_eq!(arabic.body["error"], "طريقة الطلب غير مسموح بها");
}

#[tokio::test]
async fn oversized_bodies_return_coded_413() {
    let app = spawn_app_with(&[("BODY_LIMIT_BYTES", "64")], RecordingMailer::default());
    let payload = json!({ "path": format!("/{}", "a".repeat(200)) }).to_string();

    let declared = Request::builder()
        .method(Method::POST)
        .uri("/api/analytics/track")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload.clone()))
        .expect("request");
    let resp = app.send(declared).await;
    assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.code(), "payload_too_large");

    let streamed = app
        .post("/api/analytics/track", None, json!({ "path": format!("/{}", "b".repeat(200)) }))
        .await;
    assert_eq!(streamed.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(streamed.code(), "payload_too_large");

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/analytics/track")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .header(header::ACCEPT_LANGUAGE, "ar-EG,ar;q=0.9")
        .body(Body::from(payload))
        .expect("request");
    let arabic = app.send(req).await;
    assert_eq!(arabic.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(arabic.body["error"], "حجم الطلب كبير جدًا");
}

#[tokio::test]
async fn malformed_query_strings_return_coded_400() {
    let app = spawn_app();
    let admin = app.admin_token().await;
    let resp = app
        .get("/api/admin/users?limit=not-a-number", Some(&admin))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.code(), "bad_request");
}
