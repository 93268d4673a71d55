#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use portald::api::{build_router, AppState};
use portald::config::Config;
use portald::db::open_in_memory;
use portald::mailer::{Mailer, OutgoingEmail};
use portald::model::GroupName;
use portald::roster::{self, NewRecord};
use portald::users::ensure_admin;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "portal_admin";
pub const ADMIN_PASSWORD: &str = "AdminPass123";
pub const STUDENT_PASSWORD: &str = "Student123";

/// Records every message; sends to addresses in `fail_for` error out.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail_for: Vec<String>,
}

impl RecordingMailer {
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("mailer lock").clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutgoingEmail> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        if self.fail_for.iter().any(|a| a == &email.to) {
            anyhow::bail!("smtp rejected {}", email.to);
        }
        self.sent.lock().expect("mailer lock").push(email.clone());
        Ok(())
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("JWT_SECRET", "test-secret-test-secret-test-secret-42"),
        ("COOKIE_SECURE", "false"),
        ("RATE_LIMIT_MAX_ATTEMPTS", "1000"),
        ("TRACK_RATE_LIMIT_MAX", "1000"),
        ("ADMIN_USERNAME", ADMIN_USERNAME),
        ("ADMIN_EMAIL", "admin@portal.test"),
        ("ADMIN_PASSWORD", ADMIN_PASSWORD),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(move |k| vars.get(k).cloned()).expect("test config")
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Vec<u8>,
}

impl TestResponse {
    pub fn code(&self) -> &str {
        self.body.get("code").and_then(Value::as_str).unwrap_or("")
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Value of a `Set-Cookie` by name, ready to send back in a `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies().into_iter().find_map(|c| {
            let pair = c.split(';').next()?.trim().to_string();
            let (k, v) = pair.split_once('=')?;
            (k == name && !v.is_empty()).then(|| pair.clone())
        })
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(&[], RecordingMailer::default())
}

pub fn spawn_app_with(overrides: &[(&str, &str)], mailer: RecordingMailer) -> TestApp {
    let config = test_config(overrides);
    let conn = open_in_memory().expect("open db");
    if let Some(admin) = &config.bootstrap_admin {
        ensure_admin(&conn, admin).expect("bootstrap admin");
    }
    let mailer = Arc::new(mailer);
    let state = AppState::new(config, conn, mailer.clone());
    let router = build_router(state.clone());
    TestApp {
        state,
        router,
        mailer,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(req).await.expect("oneshot");
        let status = resp.status();
        let headers = resp.headers().clone();
        let raw = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            raw,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub fn seed_roster(&self, full_name: &str, section: u8, group: GroupName) -> String {
        let conn = self.state.db.lock().expect("db lock");
        roster::insert(
            &conn,
            &NewRecord {
                full_name: full_name.to_string(),
                section_number: section,
                group_name: group,
                student_id: None,
                email: None,
            },
        )
        .expect("seed roster")
    }

    pub async fn admin_token(&self) -> String {
        let resp = self
            .post(
                "/api/admin/login",
                None,
                json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "admin login: {}", resp.body);
        token_of(&resp)
    }

    /// Seeds a roster row and registers against it. Returns the access token
    /// and the created user.
    pub async fn register_student(
        &self,
        username: &str,
        full_name: &str,
        section: u8,
        group: GroupName,
    ) -> (String, Value) {
        self.seed_roster(full_name, section, group);
        let resp = self
            .post(
                "/api/auth/register",
                None,
                registration(username, full_name, section, group.as_str()),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register: {}", resp.body);
        (token_of(&resp), resp.body["user"].clone())
    }
}

pub fn registration(username: &str, full_name: &str, section: u8, group: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{username}@students.test"),
        "password": STUDENT_PASSWORD,
        "fullName": full_name,
        "sectionNumber": section,
        "groupName": group,
    })
}

pub fn token_of(resp: &TestResponse) -> String {
    resp.body
        .get("token")
        .and_then(Value::as_str)
        .expect("token in body")
        .to_string()
}
