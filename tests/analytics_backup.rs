mod test_support;

use axum::http::{header, StatusCode};
use portald::backup::{verify_bundle, BUNDLE_FORMAT};
use portald::model::GroupName;
use serde_json::json;
use test_support::spawn_app;

#[tokio::test]
async fn health_reports_database_status() {
    let app = spawn_app();
    let resp = app.get("/api/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["status"], "ok");
    assert_eq!(resp.body["database"], "ok");
    assert_eq!(resp.body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn page_views_feed_the_summary() {
    let app = spawn_app();
    let admin = app.admin_token().await;
    let (student, _) = app
        .register_student("jana_l", "Jana Lotfy", 3, GroupName::One)
        .await;

    for (path, token) in [
        ("/dashboard", Some(student.as_str())),
        ("/dashboard", None),
        ("/schedule", Some(student.as_str())),
    ] {
        let resp = app
            .post("/api/analytics/track", token, json!({ "path": path }))
            .await;
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
    }
    let bad = app
        .post("/api/analytics/track", None, json!({ "path": "dashboard" }))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.code(), "path_invalid");

    let summary = app.get("/api/admin/analytics", Some(&admin)).await;
    assert_eq!(summary.status, StatusCode::OK, "{}", summary.body);
    let s = &summary.body;
    assert_eq!(s["users"]["students"], 1);
    assert_eq!(s["users"]["admins"], 1);
    assert_eq!(s["roster"]["registered"], 1);
    assert_eq!(s["pageViews"], 3);
    assert_eq!(s["topPages"][0]["path"], "/dashboard");
    assert_eq!(s["topPages"][0]["views"], 2);
    let days = s["registrationsPerDay"].as_array().expect("days");
    assert_eq!(days.len(), 14);
    assert_eq!(days.last().map(|d| d["count"].clone()), Some(json!(1)));

    let forbidden = app.get("/api/admin/analytics", Some(&student)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn backup_download_is_a_verifiable_zip() {
    let app = spawn_app();
    let admin = app.admin_token().await;
    app.register_student("omar_z", "Omar Zein", 12, GroupName::Two)
        .await;

    let resp = app.get("/api/admin/backup", Some(&admin)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/zip")
    );
    let disposition = resp
        .headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .expect("content-disposition");
    assert!(disposition.starts_with("attachment; filename=\"portal-backup-"));

    let summary = verify_bundle(&resp.raw).expect("valid bundle");
    assert_eq!(summary.bundle_format, BUNDLE_FORMAT);
    assert_eq!(summary.rows.get("users"), Some(&2));
    assert_eq!(summary.rows.get("verification_records"), Some(&1));
}
