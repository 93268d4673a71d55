use super::error::{render, AppError, ErrorMsg};
use super::extract::client_ip;
use super::types::AppState;
use crate::i18n::{Lang, Msg};
use crate::rate_limit::{Decision, RateLimiter};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Throttles credential endpoints per client IP and path.
pub async fn rate_limit_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&state.limiter, &state, request, next).await
}

/// Caps anonymous page-view writes per client IP.
pub async fn track_rate_limit_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&state.track_limiter, &state, request, next).await
}

async fn guard(
    limiter: &RateLimiter,
    state: &AppState,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(
        request.headers(),
        request.extensions(),
        state.config.trust_proxy_headers,
    );
    let scope = request.uri().path().to_string();
    match limiter.check(ip, &scope) {
        Decision::Allowed { .. } => Ok(next.run(request).await),
        Decision::Limited { retry_after } => {
            warn!(
                event = "rate_limit.exceeded",
                ip = %ip,
                path = %scope,
                retry_after_secs = retry_after.as_secs(),
                "too many attempts"
            );
            Err(AppError::rate_limited(retry_after.as_secs()))
        }
    }
}

/// Gives every error response the `{error, code}` body in the client's
/// language. Errors produced outside our handlers (405 from the method
/// router, 413 from the body limit, extractor rejections) carry no
/// `ErrorMsg` and are mapped from their status.
pub async fn localize_errors(request: Request, next: Next) -> Response {
    let lang = Lang::from_headers(request.headers());
    let resp = next.run(request).await;
    let status = resp.status();
    let tagged = resp.extensions().get::<ErrorMsg>().copied();
    let msg = match tagged {
        Some(_) if lang == Lang::En => return resp,
        Some(ErrorMsg(msg)) => msg,
        None => match msg_for_status(status) {
            Some(msg) => msg,
            None => return resp,
        },
    };
    let mut headers = resp.headers().clone();
    headers.remove(CONTENT_TYPE);
    headers.remove(CONTENT_LENGTH);
    let mut rendered = render(status, msg, lang);
    rendered.headers_mut().extend(headers);
    rendered
}

fn msg_for_status(status: StatusCode) -> Option<Msg> {
    match status {
        StatusCode::NOT_FOUND => Some(Msg::RouteNotFound),
        StatusCode::METHOD_NOT_ALLOWED => Some(Msg::MethodNotAllowed),
        StatusCode::PAYLOAD_TOO_LARGE => Some(Msg::PayloadTooLarge),
        s if s.is_server_error() => Some(Msg::Internal),
        s if s.is_client_error() => Some(Msg::BadRequest),
        _ => None,
    }
}
