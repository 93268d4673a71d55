use crate::api::error::AppError;
use crate::api::extract::{AdminUser, JsonBody};
use crate::api::types::AppState;
use crate::articles::{self, ArticleInput};
use crate::i18n::Msg;
use crate::model::GroupName;
use crate::schedule::{self, ScheduleInput};
use crate::tasks::{self, TaskInput};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

type Created = (StatusCode, Json<Value>);

fn deleted(id: String) -> Json<Value> {
    Json(json!({ "deleted": true, "id": id }))
}

pub async fn list_articles(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    Ok(Json(json!({ "articles": articles::list_all(&conn)? })))
}

pub async fn create_article(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<ArticleInput>,
) -> Result<Created, AppError> {
    let draft = articles::draft(&input, Some(&admin.user_id)).map_err(AppError::bad_request)?;
    let conn = state.db.lock()?;
    let article = articles::insert(&conn, &draft)?;
    info!(event = "admin.article_created", admin_id = %admin.user_id, article_id = %article.id, published = article.is_published, "article created");
    Ok((StatusCode::CREATED, Json(json!({ "article": article }))))
}

pub async fn update_article(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<ArticleInput>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let existing = articles::find(&conn, &id)?.ok_or_else(|| AppError::not_found(Msg::ArticleNotFound))?;
    let next = articles::apply(existing, &input).map_err(AppError::bad_request)?;
    let article = articles::save(&conn, &next)?;
    info!(event = "admin.article_updated", admin_id = %admin.user_id, article_id = %article.id, "article updated");
    Ok(Json(json!({ "article": article })))
}

pub async fn delete_article(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    if !articles::delete(&conn, &id)? {
        return Err(AppError::not_found(Msg::ArticleNotFound));
    }
    info!(event = "admin.article_deleted", admin_id = %admin.user_id, article_id = %id, "article deleted");
    Ok(deleted(id))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    Ok(Json(json!({ "tasks": tasks::list_all(&conn)? })))
}

pub async fn create_task(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<TaskInput>,
) -> Result<Created, AppError> {
    let draft = tasks::draft(&input, Some(&admin.user_id)).map_err(AppError::bad_request)?;
    let conn = state.db.lock()?;
    let task = tasks::insert(&conn, &draft)?;
    info!(event = "admin.task_created", admin_id = %admin.user_id, task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(json!({ "task": task }))))
}

pub async fn update_task(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<TaskInput>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let existing = tasks::find(&conn, &id)?.ok_or_else(|| AppError::not_found(Msg::TaskNotFound))?;
    let next = tasks::apply(existing, &input).map_err(AppError::bad_request)?;
    let task = tasks::save(&conn, &next)?;
    info!(event = "admin.task_updated", admin_id = %admin.user_id, task_id = %task.id, "task updated");
    Ok(Json(json!({ "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    if !tasks::delete(&conn, &id)? {
        return Err(AppError::not_found(Msg::TaskNotFound));
    }
    info!(event = "admin.task_deleted", admin_id = %admin.user_id, task_id = %id, "task deleted");
    Ok(deleted(id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub group_name: Option<String>,
}

pub async fn list_schedule(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<ScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let group = match q.group_name.as_deref().filter(|g| !g.is_empty()) {
        Some(g) => Some(GroupName::parse(g).ok_or_else(|| AppError::bad_request(Msg::GroupInvalid))?),
        None => None,
    };
    let conn = state.db.lock()?;
    Ok(Json(json!({ "entries": schedule::list(&conn, group)? })))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<ScheduleInput>,
) -> Result<Created, AppError> {
    let entry = schedule::prepare(&input, None).map_err(AppError::bad_request)?;
    let conn = state.db.lock()?;
    let entry = schedule::insert(&conn, &entry)?;
    info!(event = "admin.schedule_created", admin_id = %admin.user_id, entry_id = %entry.id, "schedule entry created");
    Ok((StatusCode::CREATED, Json(json!({ "entry": entry }))))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<ScheduleInput>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let existing =
        schedule::find(&conn, &id)?.ok_or_else(|| AppError::not_found(Msg::ScheduleEntryNotFound))?;
    let next = schedule::prepare(&input, Some(&existing)).map_err(AppError::bad_request)?;
    let entry = schedule::save(&conn, &next)?;
    info!(event = "admin.schedule_updated", admin_id = %admin.user_id, entry_id = %entry.id, "schedule entry updated");
    Ok(Json(json!({ "entry": entry })))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    if !schedule::delete(&conn, &id)? {
        return Err(AppError::not_found(Msg::ScheduleEntryNotFound));
    }
    info!(event = "admin.schedule_deleted", admin_id = %admin.user_id, entry_id = %id, "schedule entry deleted");
    Ok(deleted(id))
}
