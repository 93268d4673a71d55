mod test_support;

use axum::http::StatusCode;
use portald::model::GroupName;
use serde_json::{json, Value};
use test_support::{spawn_app, TestApp};

async fn create(app: &TestApp, admin: &str, path: &str, body: Value, key: &str) -> String {
    let resp = app.post(path, Some(admin), body).await;
    assert_eq!(resp.status, StatusCode::CREATED, "{path}: {}", resp.body);
    resp.body[key]["id"].as_str().expect("id").to_string()
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .expect("array")
        .iter()
        .filter_map(|v| v["id"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn dashboard_shows_only_what_the_student_can_see() {
    let app = spawn_app();
    let admin = app.admin_token().await;
    let (student, _) = app
        .register_student("reem_s", "Reem Sherif", 9, GroupName::Two)
        .await;

    let published = create(
        &app,
        &admin,
        "/api/admin/articles",
        json!({ "titleEn": "Exam week", "titleAr": "أسبوع الامتحانات", "bodyEn": "Good luck", "isPublished": true }),
        "article",
    )
    .await;
    let hidden = create(
        &app,
        &admin,
        "/api/admin/articles",
        json!({ "titleEn": "Draft notes" }),
        "article",
    )
    .await;

    let everyone = create(&app, &admin, "/api/admin/tasks", json!({ "title": "Read syllabus" }), "task").await;
    let my_group = create(
        &app,
        &admin,
        "/api/admin/tasks",
        json!({ "title": "Lab report", "groupName": "Group 2", "dueDate": "2030-01-15" }),
        "task",
    )
    .await;
    let my_section = create(
        &app,
        &admin,
        "/api/admin/tasks",
        json!({ "title": "Section quiz", "groupName": "Group 2", "sectionNumber": 9 }),
        "task",
    )
    .await;
    let other_section = create(
        &app,
        &admin,
        "/api/admin/tasks",
        json!({ "title": "Other quiz", "groupName": "Group 2", "sectionNumber": 10 }),
        "task",
    )
    .await;
    let other_group = create(
        &app,
        &admin,
        "/api/admin/tasks",
        json!({ "title": "Group 1 essay", "groupName": "Group 1" }),
        "task",
    )
    .await;

    for (day, start, end, section) in [
        ("Tuesday", "10:00", "11:30", json!(null)),
        ("sunday", "09:00", "10:00", json!(9)),
        ("Sunday", "08:00", "09:00", json!(10)),
    ] {
        create(
            &app,
            &admin,
            "/api/admin/schedule",
            json!({
                "groupName": "Group 2",
                "sectionNumber": section,
                "day": day,
                "startTime": start,
                "endTime": end,
                "subject": "Anatomy",
            }),
            "entry",
        )
        .await;
    }

    let dash = app.get("/api/student/dashboard", Some(&student)).await;
    assert_eq!(dash.status, StatusCode::OK, "{}", dash.body);
    assert_eq!(dash.body["user"]["username"], "reem_s");

    let articles = ids(&dash.body["articles"]);
    assert_eq!(articles, vec![published.clone()]);

    let tasks = ids(&dash.body["tasks"]);
    for visible in [&everyone, &my_group, &my_section] {
        assert!(tasks.contains(visible));
    }
    for invisible in [&other_section, &other_group] {
        assert!(!tasks.contains(invisible));
    }
    assert_eq!(dash.body["stats"]["tasksTotal"], 3);
    assert_eq!(dash.body["stats"]["tasksCompleted"], 0);

    let days: Vec<&str> = dash.body["schedule"]
        .as_array()
        .expect("schedule")
        .iter()
        .filter_map(|e| e["day"].as_str())
        .collect();
    assert_eq!(days, vec!["Sunday", "Tuesday"]);

    let draft = app
        .get(&format!("/api/student/articles/{hidden}"), Some(&student))
        .await;
    assert_eq!(draft.status, StatusCode::NOT_FOUND);
    assert_eq!(draft.code(), "article_not_found");
    let one = app
        .get(&format!("/api/student/articles/{published}"), Some(&student))
        .await;
    assert_eq!(one.body["article"]["titleAr"], "أسبوع الامتحانات");

    let done = app
        .post(
            &format!("/api/student/tasks/{my_section}/complete"),
            Some(&student),
            json!({}),
        )
        .await;
    assert_eq!(done.status, StatusCode::OK);
    let twice = app
        .post(
            &format!("/api/student/tasks/{my_section}/complete"),
            Some(&student),
            json!({}),
        )
        .await;
    assert_eq!(twice.status, StatusCode::OK);
    let blocked = app
        .post(
            &format!("/api/student/tasks/{other_group}/complete"),
            Some(&student),
            json!({}),
        )
        .await;
    assert_eq!(blocked.status, StatusCode::NOT_FOUND);
    assert_eq!(blocked.code(), "task_not_found");

    let tasks = app.get("/api/student/tasks", Some(&student)).await;
    let completed: Vec<&Value> = tasks.body["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .filter(|t| t["completed"] == true)
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["id"], my_section.as_str());

    let undone = app
        .delete(
            &format!("/api/student/tasks/{my_section}/complete"),
            Some(&student),
        )
        .await;
    assert_eq!(undone.status, StatusCode::OK);
    let dash = app.get("/api/student/dashboard", Some(&student)).await;
    assert_eq!(dash.body["stats"]["tasksCompleted"], 0);
}

#[tokio::test]
async fn student_routes_require_authentication() {
    let app = spawn_app();
    for path in [
        "/api/student/dashboard",
        "/api/student/schedule",
        "/api/student/articles",
        "/api/student/tasks",
    ] {
        assert_eq!(app.get(path, None).await.status, StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn article_updates_are_partial_and_track_publication() {
    let app = spawn_app();
    let admin = app.admin_token().await;
    let id = create(
        &app,
        &admin,
        "/api/admin/articles",
        json!({ "titleEn": "Timetable", "category": "news" }),
        "article",
    )
    .await;

    let published = app
        .put(
            &format!("/api/admin/articles/{id}"),
            Some(&admin),
            json!({ "isPublished": true }),
        )
        .await;
    assert_eq!(published.status, StatusCode::OK);
    assert_eq!(published.body["article"]["titleEn"], "Timetable");
    assert_eq!(published.body["article"]["category"], "news");
    assert!(published.body["article"]["publishedAt"].is_string());

    let unpublished = app
        .put(
            &format!("/api/admin/articles/{id}"),
            Some(&admin),
            json!({ "isPublished": false }),
        )
        .await;
    assert!(unpublished.body["article"]["publishedAt"].is_null());

    let untitled = app
        .post("/api/admin/articles", Some(&admin), json!({ "bodyEn": "x" }))
        .await;
    assert_eq!(untitled.code(), "title_required");

    let removed = app
        .delete(&format!("/api/admin/articles/{id}"), Some(&admin))
        .await;
    assert_eq!(removed.body["deleted"], true);
    let missing = app
        .put(
            &format!("/api/admin/articles/{id}"),
            Some(&admin),
            json!({ "isPublished": true }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tasks_and_schedule_reject_bad_input() {
    let app = spawn_app();
    let admin = app.admin_token().await;

    let cases = [
        ("/api/admin/tasks", json!({ "title": "T", "dueDate": "15/01/2030" }), "invalid_date"),
        ("/api/admin/tasks", json!({ "title": "T", "sectionNumber": 3 }), "group_invalid"),
        (
            "/api/admin/tasks",
            json!({ "title": "T", "groupName": "Group 1", "sectionNumber": 12 }),
            "section_group_mismatch",
        ),
        (
            "/api/admin/schedule",
            json!({ "groupName": "Group 1", "day": "Someday", "startTime": "09:00", "endTime": "10:00", "subject": "S" }),
            "invalid_day",
        ),
        (
            "/api/admin/schedule",
            json!({ "groupName": "Group 1", "day": "Monday", "startTime": "9am", "endTime": "10:00", "subject": "S" }),
            "invalid_time",
        ),
        (
            "/api/admin/schedule",
            json!({ "groupName": "Group 1", "day": "Monday", "startTime": "10:00", "endTime": "10:00", "subject": "S" }),
            "time_range_invalid",
        ),
    ];
    for (path, body, code) in cases {
        let resp = app.post(path, Some(&admin), body).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{code}: {}", resp.body);
        assert_eq!(resp.code(), code);
    }

    let id = create(
        &app,
        &admin,
        "/api/admin/schedule",
        json!({ "groupName": "Group 1", "day": "Mon", "startTime": "09:00", "endTime": "10:00", "subject": "Physiology" }),
        "entry",
    )
    .await;
    let listed = app
        .get("/api/admin/schedule?groupName=Group%201", Some(&admin))
        .await;
    assert_eq!(listed.body["entries"][0]["day"], "Monday");
    let none = app
        .get("/api/admin/schedule?groupName=Group%202", Some(&admin))
        .await;
    assert_eq!(none.body["entries"], json!([]));

    let gone = app
        .delete(&format!("/api/admin/schedule/{id}"), Some(&admin))
        .await;
    assert_eq!(gone.status, StatusCode::OK);
    let again = app
        .delete(&format!("/api/admin/schedule/{id}"), Some(&admin))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    assert_eq!(again.code(), "schedule_entry_not_found");
}

#[tokio::test]
async fn unknown_routes_are_localized_404s() {
    let app = spawn_app();
    let resp = app.get("/api/nowhere", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.code(), "not_found");
}
