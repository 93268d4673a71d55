use crate::api::current_user;
use crate::api::error::AppError;
use crate::api::extract::AuthUser;
use crate::api::types::AppState;
use crate::articles;
use crate::i18n::Msg;
use crate::schedule;
use crate::tasks;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

const DASHBOARD_ARTICLES: i64 = 10;
const ARTICLE_PAGE: i64 = 100;

/// Everything the student landing page needs in one call, filtered by the
/// stored placement rather than the token claims.
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let user = current_user(&conn, &claims)?;
    let schedule = schedule::week_for(&conn, user.group_name, user.section_number)?;
    let articles = articles::list_published(&conn, DASHBOARD_ARTICLES)?;
    let tasks = tasks::list_for(&conn, &user)?;
    let completed = tasks.iter().filter(|t| t.completed).count();
    Ok(Json(json!({
        "stats": { "tasksTotal": tasks.len(), "tasksCompleted": completed },
        "user": user,
        "schedule": schedule,
        "articles": articles,
        "tasks": tasks,
    })))
}

pub async fn schedule(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let user = current_user(&conn, &claims)?;
    let entries = schedule::week_for(&conn, user.group_name, user.section_number)?;
    Ok(Json(json!({ "schedule": entries })))
}

pub async fn list_articles(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    current_user(&conn, &claims)?;
    Ok(Json(json!({ "articles": articles::list_published(&conn, ARTICLE_PAGE)? })))
}

pub async fn get_article(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    current_user(&conn, &claims)?;
    let article = articles::find_published(&conn, &id)?
        .ok_or_else(|| AppError::not_found(Msg::ArticleNotFound))?;
    Ok(Json(json!({ "article": article })))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let user = current_user(&conn, &claims)?;
    Ok(Json(json!({ "tasks": tasks::list_for(&conn, &user)? })))
}

pub async fn complete_task(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let user = current_user(&conn, &claims)?;
    tasks::find_visible(&conn, &user, &id)?.ok_or_else(|| AppError::not_found(Msg::TaskNotFound))?;
    tasks::mark_complete(&conn, &user.id, &id)?;
    debug!(event = "student.task_completed", user_id = %user.id, task_id = %id, "task completed");
    Ok(Json(json!({ "taskId": id, "completed": true })))
}

pub async fn uncomplete_task(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let user = current_user(&conn, &claims)?;
    tasks::find_visible(&conn, &user, &id)?.ok_or_else(|| AppError::not_found(Msg::TaskNotFound))?;
    tasks::clear_complete(&conn, &user.id, &id)?;
    Ok(Json(json!({ "taskId": id, "completed": false })))
}
