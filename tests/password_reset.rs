mod test_support;

use axum::http::StatusCode;
use portald::model::GroupName;
use serde_json::json;
use test_support::{spawn_app, STUDENT_PASSWORD};

fn code_in(body: &str) -> String {
    body.split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == 6)
        .expect("six digit code")
        .to_string()
}

#[tokio::test]
async fn forgot_password_answers_generically() {
    let app = spawn_app();
    app.register_student("lina_z", "Lina Zaki", 4, GroupName::One)
        .await;
    let mails_before = app.mailer.sent().len();

    let known = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "lina_z@students.test" }),
        )
        .await;
    let unknown = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "who@students.test" }),
        )
        .await;
    let malformed = app
        .post("/api/auth/forgot-password", None, json!({ "email": "nope" }))
        .await;
    for resp in [&known, &unknown, &malformed] {
        assert_eq!(resp.status, StatusCode::OK);
    }
    assert_eq!(known.body, unknown.body);
    assert_eq!(app.mailer.sent().len(), mails_before + 1);
}

#[tokio::test]
async fn reset_code_changes_password_once() {
    let app = spawn_app();
    app.register_student("fady_w", "Fady Wael", 10, GroupName::Two)
        .await;
    app.post(
        "/api/auth/forgot-password",
        None,
        json!({ "email": "fady_w@students.test" }),
    )
    .await;
    let mail = app
        .mailer
        .sent_to("fady_w@students.test")
        .into_iter()
        .last()
        .expect("reset mail");
    let code = code_in(&mail.body);

    let weak = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "email": "fady_w@students.test", "code": code, "newPassword": "weak" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.code(), "password_too_short");

    let wrong_code = if code == "000000" { "111111" } else { "000000" };
    let wrong = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "email": "fady_w@students.test", "code": wrong_code, "newPassword": "Renewed123" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.code(), "reset_code_invalid");

    let ok = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "email": "Fady_W@students.test", "code": code, "newPassword": "Renewed123" }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK, "{}", ok.body);

    let reused = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "email": "fady_w@students.test", "code": code, "newPassword": "Another123" }),
        )
        .await;
    assert_eq!(reused.code(), "reset_code_invalid");

    let old = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "fady_w", "password": STUDENT_PASSWORD }),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "fady_w", "password": "Renewed123" }),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}
