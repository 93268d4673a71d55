use super::auth::ensure_no_conflict;
use crate::api::error::AppError;
use crate::api::extract::{AdminUser, JsonBody};
use crate::api::types::AppState;
use crate::api::{hash_password, page};
use crate::i18n::Msg;
use crate::model::Role;
use crate::users::{self, NewUser, UserFilter};
use crate::validate;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

fn parse_role(raw: Option<&str>, default: Role) -> Result<Role, AppError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(default),
        Some(r) => Role::parse(r).ok_or_else(|| AppError::bad_request(Msg::RoleInvalid)),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub role: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let role = match q.role.as_deref() {
        Some(r) => Some(parse_role(Some(r), Role::Student)?),
        None => None,
    };
    let (limit, offset) = page(q.limit, q.offset);
    let conn = state.db.lock()?;
    let (rows, total) = users::list(
        &conn,
        &UserFilter {
            role,
            query: q.q,
            limit,
            offset,
        },
    )?;
    Ok(Json(json!({ "users": rows, "total": total, "limit": limit, "offset": offset })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub section_number: Option<Value>,
    pub group_name: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(form): JsonBody<CreateUserForm>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let username = validate::username(form.username.as_deref()).map_err(AppError::bad_request)?;
    let email = validate::email(form.email.as_deref()).map_err(AppError::bad_request)?;
    let full_name = validate::full_name(form.full_name.as_deref()).map_err(AppError::bad_request)?;
    let role = parse_role(form.role.as_deref(), Role::Student)?;
    let (section_number, group_name) = validate::placement(
        form.section_number.as_ref(),
        form.group_name.as_deref(),
        role == Role::Student,
    )
    .map_err(AppError::bad_request)?;
    let password = validate::new_password(form.password.as_deref()).map_err(AppError::bad_request)?;

    {
        let conn = state.db.lock()?;
        ensure_no_conflict(&conn, Some(&username), Some(&email), None)?;
    }
    let password_hash = hash_password(password).await?;

    let conn = state.db.lock()?;
    ensure_no_conflict(&conn, Some(&username), Some(&email), None)?;
    let user = users::insert(
        &conn,
        &NewUser {
            username,
            email,
            password_hash,
            full_name,
            section_number,
            group_name,
            role,
            is_active: form.is_active.unwrap_or(true),
        },
    )?;
    info!(event = "admin.user_created", admin_id = %admin.user_id, user_id = %user.id, role = role.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

pub async fn get_one(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let user = users::find_by_id(&conn, &id)?.ok_or_else(|| AppError::not_found(Msg::UserNotFound))?;
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserForm {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub section_number: Option<Value>,
    pub group_name: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Partial update. Placement is re-validated against the merged role,
/// section and group.
pub async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(form): JsonBody<UpdateUserForm>,
) -> Result<Json<Value>, AppError> {
    let new_hash = match form.password.as_deref() {
        Some(p) => {
            let p = validate::new_password(Some(p)).map_err(AppError::bad_request)?;
            Some(hash_password(p).await?)
        }
        None => None,
    };

    let conn = state.db.lock()?;
    let mut user = users::find_by_id(&conn, &id)?.ok_or_else(|| AppError::not_found(Msg::UserNotFound))?;
    if let Some(e) = form.email.as_deref() {
        let email = validate::email(Some(e)).map_err(AppError::bad_request)?;
        ensure_no_conflict(&conn, None, Some(&email), Some(&user.id))?;
        user.email = email;
    }
    if let Some(n) = form.full_name.as_deref() {
        user.full_name = validate::full_name(Some(n)).map_err(AppError::bad_request)?;
    }
    if form.role.is_some() {
        user.role = parse_role(form.role.as_deref(), user.role)?;
    }
    let section = form
        .section_number
        .clone()
        .or_else(|| user.section_number.map(Value::from));
    let group = form
        .group_name
        .clone()
        .or_else(|| user.group_name.map(|g| g.as_str().to_string()));
    let (section_number, group_name) =
        validate::placement(section.as_ref(), group.as_deref(), user.role == Role::Student)
            .map_err(AppError::bad_request)?;
    user.section_number = section_number;
    user.group_name = group_name;
    if let Some(active) = form.is_active {
        user.is_active = active;
    }

    let user = users::save(&conn, &user)?;
    if let Some(hash) = new_hash {
        users::set_password(&conn, &user.id, &hash)?;
    }
    info!(event = "admin.user_updated", admin_id = %admin.user_id, user_id = %user.id, "user updated");
    Ok(Json(json!({ "user": user })))
}

pub async fn delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if admin.user_id == id {
        return Err(AppError::bad_request(Msg::CannotDeleteSelf));
    }
    let conn = state.db.lock()?;
    if !users::delete_with_roster_reset(&conn, &id)? {
        return Err(AppError::not_found(Msg::UserNotFound));
    }
    info!(event = "admin.user_deleted", admin_id = %admin.user_id, user_id = %id, "user deleted");
    Ok(Json(json!({ "deleted": true, "id": id })))
}
