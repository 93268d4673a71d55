use crate::api::error::AppError;
use crate::api::extract::{AuthUser, JsonBody};
use crate::api::types::AppState;
use crate::api::{current_user, hash_password, verify_password};
use crate::cookies;
use crate::i18n::{Lang, Msg};
use crate::mailer::{reset_code_email, send_best_effort, welcome_email};
use crate::model::Role;
use crate::roster;
use crate::tokens::{Subject, TokenPair};
use crate::users::{self, Conflict, NewUser, User};
use crate::validate::{self, Registration, RegistrationForm};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

type SetCookies = AppendHeaders<[(HeaderName, String); 2]>;

/// `refresh_token` (HTTP-only) and `access_token` (script-readable).
pub(crate) fn student_cookies(state: &AppState, pair: &TokenPair) -> SetCookies {
    AppendHeaders([
        (
            SET_COOKIE,
            cookies::set(
                cookies::REFRESH_TOKEN,
                &pair.refresh,
                state.tokens.refresh_ttl(),
                state.cookie_spec(true),
            ),
        ),
        (
            SET_COOKIE,
            cookies::set(
                cookies::ACCESS_TOKEN,
                &pair.access,
                state.tokens.access_ttl(),
                state.cookie_spec(false),
            ),
        ),
    ])
}

pub(crate) fn clear_student_cookies(state: &AppState) -> SetCookies {
    AppendHeaders([
        (
            SET_COOKIE,
            cookies::clear(cookies::REFRESH_TOKEN, state.cookie_spec(true)),
        ),
        (
            SET_COOKIE,
            cookies::clear(cookies::ACCESS_TOKEN, state.cookie_spec(false)),
        ),
    ])
}

fn conflict_error(c: Conflict) -> AppError {
    match c {
        Conflict::Username => AppError::conflict(Msg::UsernameTaken),
        Conflict::Email => AppError::conflict(Msg::EmailTaken),
    }
}

pub(crate) fn ensure_no_conflict(
    conn: &Connection,
    username: Option<&str>,
    email: Option<&str>,
    exclude_id: Option<&str>,
) -> Result<(), AppError> {
    match users::find_conflict(conn, username, email, exclude_id)? {
        Some(c) => Err(conflict_error(c)),
        None => Ok(()),
    }
}

/// User insert and roster claim in one transaction. The claim only succeeds
/// while the record is still unregistered, so a lost race rolls back.
fn create_registered_user(
    conn: &Connection,
    reg: &Registration,
    password_hash: String,
) -> Result<User, AppError> {
    let tx = conn.unchecked_transaction()?;
    let record = roster::find_unregistered_match(
        &tx,
        &reg.full_name,
        reg.section_number,
        reg.group_name,
    )?
    .ok_or_else(|| AppError::forbidden(Msg::RosterMismatch))?;
    ensure_no_conflict(&tx, Some(&reg.username), Some(&reg.email), None)?;
    let user = users::insert(
        &tx,
        &NewUser {
            username: reg.username.clone(),
            email: reg.email.clone(),
            password_hash,
            full_name: reg.full_name.clone(),
            section_number: Some(reg.section_number),
            group_name: Some(reg.group_name),
            role: Role::Student,
            is_active: true,
        },
    )?;
    if !roster::claim(&tx, &record.id, &user.id)? {
        return Err(AppError::forbidden(Msg::RosterMismatch));
    }
    tx.commit()?;
    Ok(user)
}

pub async fn register(
    State(state): State<AppState>,
    lang: Lang,
    JsonBody(form): JsonBody<RegistrationForm>,
) -> Result<Response, AppError> {
    let reg = validate::registration(&form).map_err(AppError::bad_request)?;

    // Cheap rejections first so mismatches never pay for a hash.
    {
        let conn = state.db.lock()?;
        let matched = roster::find_unregistered_match(
            &conn,
            &reg.full_name,
            reg.section_number,
            reg.group_name,
        )?;
        if matched.is_none() {
            warn!(
                event = "auth.register_mismatch",
                section = reg.section_number,
                group = %reg.group_name,
                "registration did not match the roster"
            );
            return Err(AppError::forbidden(Msg::RosterMismatch));
        }
        ensure_no_conflict(&conn, Some(&reg.username), Some(&reg.email), None)?;
    }

    let hash = hash_password(reg.password.clone()).await?;
    let user = {
        let conn = state.db.lock()?;
        create_registered_user(&conn, &reg, hash)?
    };

    let pair = state.tokens.issue_pair(&Subject::from(&user))?;
    send_best_effort(
        state.mailer.as_ref(),
        &welcome_email(&user.email, &user.full_name, &user.username),
    );
    info!(event = "auth.register", user_id = %user.id, username = %user.username, "student registered");

    Ok((
        StatusCode::CREATED,
        student_cookies(&state, &pair),
        Json(json!({
            "message": Msg::RegistrationSucceeded.text(lang),
            "user": user,
            "token": pair.access,
        })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Shared by the student and admin schemes. Unknown users and wrong
/// passwords are indistinguishable to the caller.
pub(crate) async fn authenticate(state: &AppState, form: &LoginForm) -> Result<User, AppError> {
    let login = form.username.as_deref().map(str::trim).unwrap_or("");
    let password = form.password.clone().unwrap_or_default();
    if login.is_empty() || password.is_empty() {
        return Err(AppError::invalid_credentials());
    }
    let found = {
        let conn = state.db.lock()?;
        users::find_by_login(&conn, login)?
    };
    let ok = verify_password(password, found.as_ref().map(|u| u.password_hash.clone())).await?;
    let Some(user) = found.filter(|_| ok) else {
        warn!(event = "auth.login_failed", login = %login, "invalid credentials");
        return Err(AppError::invalid_credentials());
    };
    if !user.is_active {
        warn!(event = "auth.login_disabled", user_id = %user.id, "disabled account");
        return Err(AppError::forbidden(Msg::AccountDisabled));
    }
    let conn = state.db.lock()?;
    users::touch_login(&conn, &user.id)?;
    Ok(users::find_by_id(&conn, &user.id)?.unwrap_or(user))
}

pub async fn login(
    State(state): State<AppState>,
    lang: Lang,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &form).await?;
    let pair = state.tokens.issue_pair(&Subject::from(&user))?;
    info!(event = "auth.login", user_id = %user.id, role = user.role.as_str(), "login");
    Ok((
        student_cookies(&state, &pair),
        Json(json!({
            "message": Msg::LoginSucceeded.text(lang),
            "user": user,
            "token": pair.access,
        })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshForm {
    refresh_token: Option<String>,
}

/// Verifies a refresh token and reloads its user, which must still exist and
/// be active.
pub(crate) fn refresh_subject(state: &AppState, token: Option<String>) -> Result<User, AppError> {
    let token = token.ok_or_else(AppError::unauthorized)?;
    let claims = state.tokens.verify_refresh(&token)?;
    let conn = state.db.lock()?;
    match users::find_by_id(&conn, &claims.user_id)? {
        Some(u) if u.is_active => Ok(u),
        _ => Err(AppError::unauthorized()),
    }
}

pub(crate) fn refresh_token_from(headers: &HeaderMap, body: &Bytes, cookie: &str) -> Option<String> {
    cookies::get(headers, cookie).or_else(|| {
        serde_json::from_slice::<RefreshForm>(body)
            .ok()
            .and_then(|f| f.refresh_token)
            .filter(|t| !t.is_empty())
    })
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token = refresh_token_from(&headers, &body, cookies::REFRESH_TOKEN);
    let user = refresh_subject(&state, token)?;
    let pair = state.tokens.issue_pair(&Subject::from(&user))?;
    Ok((student_cookies(&state, &pair), Json(json!({ "token": pair.access }))).into_response())
}

pub async fn logout(State(state): State<AppState>, lang: Lang) -> Response {
    (
        clear_student_cookies(&state),
        Json(json!({ "message": Msg::LoggedOut.text(lang) })),
    )
        .into_response()
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let conn = state.db.lock()?;
    let user = users::find_by_id(&conn, &claims.user_id)?
        .ok_or_else(|| AppError::not_found(Msg::UserNotFound))?;
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    JsonBody(form): JsonBody<ProfileForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = match form.email.as_deref() {
        Some(e) => Some(validate::email(Some(e)).map_err(AppError::bad_request)?),
        None => None,
    };
    let full_name = match form.full_name.as_deref() {
        Some(n) => Some(validate::full_name(Some(n)).map_err(AppError::bad_request)?),
        None => None,
    };
    let conn = state.db.lock()?;
    let mut user = current_user(&conn, &claims)?;
    if let Some(email) = email {
        ensure_no_conflict(&conn, None, Some(&email), Some(&user.id))?;
        user.email = email;
    }
    if let Some(name) = full_name {
        user.full_name = name;
    }
    let user = users::save(&conn, &user)?;
    info!(event = "auth.profile_updated", user_id = %user.id, "profile updated");
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordForm {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn change_password(
    State(state): State<AppState>,
    lang: Lang,
    AuthUser(claims): AuthUser,
    JsonBody(form): JsonBody<PasswordForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let new_password =
        validate::new_password(form.new_password.as_deref()).map_err(AppError::bad_request)?;
    let user = {
        let conn = state.db.lock()?;
        current_user(&conn, &claims)?
    };
    let current = form.current_password.unwrap_or_default();
    if !verify_password(current, Some(user.password_hash.clone())).await? {
        return Err(AppError::bad_request(Msg::CurrentPasswordIncorrect));
    }
    let hash = hash_password(new_password).await?;
    let conn = state.db.lock()?;
    users::set_password(&conn, &user.id, &hash)?;
    info!(event = "auth.password_changed", user_id = %user.id, "password changed");
    Ok(Json(json!({ "message": Msg::PasswordChanged.text(lang) })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotForm {
    pub email: Option<String>,
}

/// Always answers the same way so the endpoint cannot reveal which accounts exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    lang: Lang,
    JsonBody(form): JsonBody<ForgotForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let generic = Json(json!({ "message": Msg::ResetCodeSent.text(lang) }));
    let Ok(email) = validate::email(form.email.as_deref()) else {
        return Ok(generic);
    };
    let user = {
        let conn = state.db.lock()?;
        users::find_by_email(&conn, &email)?
    };
    if let Some(user) = user.filter(|u| u.is_active) {
        let code = state.codes.issue(&email);
        let minutes = state.codes.ttl().as_secs() / 60;
        send_best_effort(state.mailer.as_ref(), &reset_code_email(&user.email, &code, minutes));
        info!(event = "auth.reset_code_issued", user_id = %user.id, "reset code issued");
    }
    Ok(generic)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetForm {
    pub email: Option<String>,
    pub code: Option<String>,
    pub new_password: Option<String>,
}

pub async fn reset_password(
    State(state): State<AppState>,
    lang: Lang,
    JsonBody(form): JsonBody<ResetForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = validate::email(form.email.as_deref()).map_err(AppError::bad_request)?;
    let new_password =
        validate::new_password(form.new_password.as_deref()).map_err(AppError::bad_request)?;
    let code = form.code.unwrap_or_default();
    if !state.codes.verify(&email, &code) {
        warn!(event = "auth.reset_code_rejected", "invalid reset code");
        return Err(AppError::bad_request(Msg::ResetCodeInvalid));
    }
    let user = {
        let conn = state.db.lock()?;
        users::find_by_email(&conn, &email)?
    }
    .filter(|u| u.is_active)
    .ok_or_else(|| AppError::bad_request(Msg::ResetCodeInvalid))?;
    let hash = hash_password(new_password).await?;
    let conn = state.db.lock()?;
    users::set_password(&conn, &user.id, &hash)?;
    info!(event = "auth.password_reset", user_id = %user.id, "password reset");
    Ok(Json(json!({ "message": Msg::PasswordChanged.text(lang) })))
}
