use crate::i18n::{Lang, Msg};
use crate::tokens::TokenError;
use axum::http::{header::RETRY_AFTER, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

/// Error returned by every handler and extractor. The client only ever sees
/// the status and the localized text of `msg`; `internal` is logged.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub msg: Msg,
    internal: Option<String>,
    retry_after: Option<u64>,
}

/// Attached to error responses so the localization layer can re-render them.
#[derive(Debug, Clone, Copy)]
pub struct ErrorMsg(pub Msg);

#[derive(Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub code: &'a str,
}

impl AppError {
    pub fn new(status: StatusCode, msg: Msg) -> Self {
        Self {
            status,
            msg,
            internal: None,
            retry_after: None,
        }
    }

    pub fn bad_request(msg: Msg) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, Msg::Unauthorized)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, Msg::InvalidCredentials)
    }

    pub fn forbidden(msg: Msg) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: Msg) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: Msg) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            retry_after: Some(retry_after_secs),
            ..Self::new(StatusCode::TOO_MANY_REQUESTS, Msg::RateLimited)
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self {
            internal: Some(details.into()),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, Msg::Internal)
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::internal(format!("{e:#}"))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::internal(format!("database: {e}"))
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(detail) => Self::internal(format!("token signing: {detail}")),
            other => {
                debug!(event = "auth.token_rejected", reason = %other, "token rejected");
                Self::unauthorized()
            }
        }
    }
}

pub fn render(status: StatusCode, msg: Msg, lang: Lang) -> Response {
    let body = ErrorBody {
        error: msg.text(lang),
        code: msg.code(),
    };
    let mut resp = (status, Json(body)).into_response();
    resp.extensions_mut().insert(ErrorMsg(msg));
    resp
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(details) = &self.internal {
            error!(event = "request.internal_error", error = %details, "internal error");
        }
        let mut resp = render(self.status, self.msg, Lang::En);
        if let Some(secs) = self.retry_after {
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                resp.headers_mut().insert(RETRY_AFTER, v);
            }
        }
        resp
    }
}
