use super::auth::{authenticate, refresh_subject, refresh_token_from, LoginForm};
use crate::api::error::AppError;
use crate::api::extract::JsonBody;
use crate::api::types::AppState;
use crate::cookies;
use crate::i18n::{Lang, Msg};
use crate::model::Role;
use crate::tokens::{Subject, TokenPair};
use crate::users::User;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{info, warn};

fn admin_cookies(state: &AppState, pair: &TokenPair) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            cookies::set(
                cookies::ADMIN_TOKEN,
                &pair.access,
                state.tokens.access_ttl(),
                state.cookie_spec(true),
            ),
        ),
        (
            SET_COOKIE,
            cookies::set(
                cookies::ADMIN_REFRESH_TOKEN,
                &pair.refresh,
                state.tokens.refresh_ttl(),
                state.cookie_spec(true),
            ),
        ),
    ])
}

fn require_admin(user: User) -> Result<User, AppError> {
    if user.role != Role::Admin {
        warn!(event = "admin.login_denied", user_id = %user.id, "non-admin used admin login");
        return Err(AppError::forbidden(Msg::Forbidden));
    }
    Ok(user)
}

pub async fn login(
    State(state): State<AppState>,
    lang: Lang,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<Response, AppError> {
    let user = require_admin(authenticate(&state, &form).await?)?;
    let pair = state.tokens.issue_pair(&Subject::from(&user))?;
    info!(event = "admin.login", user_id = %user.id, "admin login");
    Ok((
        admin_cookies(&state, &pair),
        Json(json!({
            "message": Msg::LoginSucceeded.text(lang),
            "user": user,
            "token": pair.access,
        })),
    )
        .into_response())
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token = refresh_token_from(&headers, &body, cookies::ADMIN_REFRESH_TOKEN);
    let user = refresh_subject(&state, token)?;
    let user = require_admin(user).map_err(|_| AppError::unauthorized())?;
    let pair = state.tokens.issue_pair(&Subject::from(&user))?;
    Ok((admin_cookies(&state, &pair), Json(json!({ "token": pair.access }))).into_response())
}

pub async fn logout(State(state): State<AppState>, lang: Lang) -> Response {
    (
        AppendHeaders([
            (
                SET_COOKIE,
                cookies::clear(cookies::ADMIN_TOKEN, state.cookie_spec(true)),
            ),
            (
                SET_COOKIE,
                cookies::clear(cookies::ADMIN_REFRESH_TOKEN, state.cookie_spec(true)),
            ),
        ]),
        Json(json!({ "message": Msg::LoggedOut.text(lang) })),
    )
        .into_response()
}
