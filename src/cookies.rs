use axum::http::{header::COOKIE, HeaderMap};
use std::time::Duration;

pub const REFRESH_TOKEN: &str = "refresh_token";
pub const ACCESS_TOKEN: &str = "access_token";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_REFRESH_TOKEN: &str = "admin-refresh-token";

/// Returns the first cookie called `name` across all `Cookie` headers.
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy)]
pub struct CookieSpec {
    pub http_only: bool,
    pub secure: bool,
}

pub fn set(name: &str, value: &str, max_age: Duration, spec: CookieSpec) -> String {
    let mut out = format!(
        "{name}={value}; Path=/; Max-Age={}; SameSite=Lax",
        max_age.as_secs()
    );
    if spec.http_only {
        out.push_str("; HttpOnly");
    }
    if spec.secure {
        out.push_str("; Secure");
    }
    out
}

pub fn clear(name: &str, spec: CookieSpec) -> String {
    set(name, "", Duration::ZERO, spec)
}
