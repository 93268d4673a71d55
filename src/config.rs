use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cookie_secure: bool,
    pub trust_proxy_headers: bool,
    pub rate_limit_max_attempts: usize,
    pub rate_limit_window: Duration,
    pub reset_code_ttl: Duration,
    /// Per-IP budget for anonymous page-view tracking.
    pub track_rate_limit_max: usize,
    pub track_rate_limit_window: Duration,
    pub page_view_retention_days: u32,
    pub mail_from: String,
    pub body_limit_bytes: usize,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup so tests can feed a map instead
    /// of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET environment variable required")?;
        if jwt_secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 characters");
        }

        let bootstrap_admin = match (
            get("ADMIN_USERNAME"),
            get("ADMIN_EMAIL"),
            get("ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(BootstrapAdmin {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => bail!("ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together"),
        };

        let rate_limit_max_attempts: usize = parse_or(&get, "RATE_LIMIT_MAX_ATTEMPTS", "5")?;
        if rate_limit_max_attempts == 0 {
            bail!("RATE_LIMIT_MAX_ATTEMPTS must be at least 1");
        }
        let track_rate_limit_max: usize = parse_or(&get, "TRACK_RATE_LIMIT_MAX", "60")?;
        if track_rate_limit_max == 0 {
            bail!("TRACK_RATE_LIMIT_MAX must be at least 1");
        }
        let page_view_retention_days: u32 = parse_or(&get, "PAGE_VIEW_RETENTION_DAYS", "90")?;
        if !(1..=MAX_RETENTION_DAYS).contains(&page_view_retention_days) {
            bail!(
                "invalid PAGE_VIEW_RETENTION_DAYS={page_view_retention_days}: expected 1..={MAX_RETENTION_DAYS}"
            );
        }

        Ok(Self {
            bind_addr: parse_or(&get, "PORTAL_BIND_ADDR", "0.0.0.0:3000")?,
            database_path: PathBuf::from(
                get("PORTAL_DB_PATH").unwrap_or_else(|| "data/portal.sqlite3".to_string()),
            ),
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER").unwrap_or_else(|| "academic-portal".to_string()),
            jwt_audience: get("JWT_AUDIENCE")
                .unwrap_or_else(|| "academic-portal-users".to_string()),
            access_token_ttl: parse_secs(&get, "ACCESS_TOKEN_TTL_SECS", "900")?,
            refresh_token_ttl: parse_secs(&get, "REFRESH_TOKEN_TTL_SECS", "604800")?,
            cookie_secure: parse_bool(&get, "COOKIE_SECURE", true)?,
            trust_proxy_headers: parse_bool(&get, "TRUST_PROXY_HEADERS", false)?,
            rate_limit_max_attempts,
            rate_limit_window: parse_secs(&get, "RATE_LIMIT_WINDOW_SECS", "900")?,
            reset_code_ttl: parse_secs(&get, "RESET_CODE_TTL_SECS", "600")?,
            track_rate_limit_max,
            track_rate_limit_window: parse_secs(&get, "TRACK_RATE_LIMIT_WINDOW_SECS", "60")?,
            page_view_retention_days,
            mail_from: get("MAIL_FROM").unwrap_or_else(|| "no-reply@portal.local".to_string()),
            body_limit_bytes: parse_or(&get, "BODY_LIMIT_BYTES", "1048576")?,
            bootstrap_admin,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}"))
}

/// Upper bound for every configured lifetime or window: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;
pub const MAX_RETENTION_DAYS: u32 = 3650;

fn parse_secs<G>(get: &G, key: &str, default: &str) -> anyhow::Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, key, default)?;
    if secs == 0 || secs > MAX_DURATION_SECS {
        bail!("invalid {key}={secs}: expected 1..={MAX_DURATION_SECS} seconds");
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> anyhow::Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => bail!("invalid {key}={v}: expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = Config::from_lookup(lookup(&[("JWT_SECRET", SECRET)])).expect("config");
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert_eq!(cfg.access_token_ttl, Duration::from_secs(900));
        assert_eq!(cfg.refresh_token_ttl, Duration::from_secs(604_800));
        assert_eq!(cfg.rate_limit_max_attempts, 5);
        assert_eq!(cfg.track_rate_limit_max, 60);
        assert_eq!(cfg.page_view_retention_days, 90);
        assert!(cfg.cookie_secure);
        assert!(!cfg.trust_proxy_headers);
        assert!(cfg.bootstrap_admin.is_none());
    }

    #[test]
    fn short_or_missing_secret_is_rejected() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "short")])).is_err());
    }

    #[test]
    fn malformed_values_fail_with_key_in_message() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("RATE_LIMIT_MAX_ATTEMPTS", "many"),
        ]))
        .expect_err("should fail");
        assert!(err.to_string().contains("RATE_LIMIT_MAX_ATTEMPTS"));

        let err = Config::from_lookup(lookup(&[("JWT_SECRET", SECRET), ("COOKIE_SECURE", "maybe")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("COOKIE_SECURE"));
    }

    #[test]
    fn durations_must_be_positive_and_at_most_a_year() {
        for key in [
            "ACCESS_TOKEN_TTL_SECS",
            "REFRESH_TOKEN_TTL_SECS",
            "RATE_LIMIT_WINDOW_SECS",
            "RESET_CODE_TTL_SECS",
        ] {
            for bad in ["0", "31536001", "18446744073709551615"] {
                let err = Config::from_lookup(lookup(&[("JWT_SECRET", SECRET), (key, bad)]))
                    .expect_err("out of range");
                assert!(err.to_string().contains(key), "{key}={bad}: {err}");
            }
        }
        let cfg = Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("REFRESH_TOKEN_TTL_SECS", "31536000"),
        ]))
        .expect("one year is allowed");
        assert_eq!(cfg.refresh_token_ttl, Duration::from_secs(MAX_DURATION_SECS));

        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("RATE_LIMIT_MAX_ATTEMPTS", "0"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("PAGE_VIEW_RETENTION_DAYS", "0"),
        ]))
        .is_err());
    }

    #[test]
    fn partial_bootstrap_admin_is_rejected() {
        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("ADMIN_USERNAME", "root"),
        ]))
        .is_err());
    }
}
