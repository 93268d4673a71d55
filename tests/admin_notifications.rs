mod test_support;

use axum::http::StatusCode;
use portald::model::GroupName;
use serde_json::json;
use test_support::{spawn_app_with, RecordingMailer};

#[tokio::test]
async fn notifications_reach_the_audience_and_count_failures() {
    let app = spawn_app_with(&[], RecordingMailer::failing_for(&["khaled_b@students.test"]));
    let admin = app.admin_token().await;
    app.register_student("mariam_g", "Mariam Gamal", 8, GroupName::Two)
        .await;
    app.register_student("khaled_b", "Khaled Badr", 9, GroupName::Two)
        .await;
    app.register_student("eman_r", "Eman Reda", 2, GroupName::One)
        .await;

    let resp = app
        .post(
            "/api/admin/notifications",
            Some(&admin),
            json!({
                "subject": "Lab moved",
                "body": "The lab is now in room 204.",
                "audience": { "role": "student", "groupName": "Group 2" },
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    let n = &resp.body["notification"];
    assert_eq!(n["recipientCount"], 2);
    assert_eq!(n["sentCount"], 1);
    assert_eq!(n["failedCount"], 1);
    assert_eq!(n["audience"]["groupName"], "Group 2");

    let lab_mails: Vec<_> = app
        .mailer
        .sent()
        .into_iter()
        .filter(|m| m.subject == "Lab moved")
        .collect();
    assert_eq!(lab_mails.len(), 1);
    assert_eq!(lab_mails[0].to, "mariam_g@students.test");

    let history = app.get("/api/admin/notifications", Some(&admin)).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.body["notifications"][0]["subject"], "Lab moved");
}

#[tokio::test]
async fn notification_input_is_validated() {
    let app = spawn_app_with(&[], RecordingMailer::default());
    let admin = app.admin_token().await;

    let no_subject = app
        .post(
            "/api/admin/notifications",
            Some(&admin),
            json!({ "subject": " ", "body": "x" }),
        )
        .await;
    assert_eq!(no_subject.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_subject.code(), "subject_required");

    let bad_role = app
        .post(
            "/api/admin/notifications",
            Some(&admin),
            json!({ "subject": "s", "body": "b", "audience": { "role": "teacher" } }),
        )
        .await;
    assert_eq!(bad_role.code(), "role_invalid");

    // Everyone active, including the admin, when no audience is given.
    let broadcast = app
        .post(
            "/api/admin/notifications",
            Some(&admin),
            json!({ "subject": "Hello", "body": "Welcome back" }),
        )
        .await;
    assert_eq!(broadcast.status, StatusCode::CREATED);
    assert_eq!(broadcast.body["notification"]["recipientCount"], 1);
}
