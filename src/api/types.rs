use crate::config::Config;
use crate::cookies::CookieSpec;
use crate::db::Db;
use crate::mailer::Mailer;
use crate::rate_limit::RateLimiter;
use crate::reset_codes::VerificationCodes;
use crate::tokens::TokenService;
use rusqlite::Connection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub limiter: RateLimiter,
    pub track_limiter: RateLimiter,
    pub codes: Arc<VerificationCodes>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, conn: Connection, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db: Db::new(conn),
            tokens: Arc::new(TokenService::from_config(&config)),
            limiter: RateLimiter::new(config.rate_limit_max_attempts, config.rate_limit_window),
            track_limiter: RateLimiter::new(
                config.track_rate_limit_max,
                config.track_rate_limit_window,
            ),
            codes: Arc::new(VerificationCodes::new(config.reset_code_ttl)),
            mailer,
            config: Arc::new(config),
        }
    }

    pub fn cookie_spec(&self, http_only: bool) -> CookieSpec {
        CookieSpec {
            http_only,
            secure: self.config.cookie_secure,
        }
    }
}
