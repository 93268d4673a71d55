use crate::api::error::AppError;
use crate::api::extract::{AdminUser, JsonBody};
use crate::api::page;
use crate::api::types::AppState;
use crate::i18n::{Lang, Msg};
use crate::model::GroupName;
use crate::roster::{self, RecordFilter};
use crate::roster_import::{self, RawRecord};
use crate::validate;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub group_name: Option<String>,
    pub section_number: Option<i64>,
    pub registered: Option<bool>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let group_name = match q.group_name.as_deref().filter(|g| !g.is_empty()) {
        Some(g) => Some(GroupName::parse(g).ok_or_else(|| AppError::bad_request(Msg::GroupInvalid))?),
        None => None,
    };
    let section_number = match q.section_number {
        Some(s) => Some(
            validate::section(Some(&Value::from(s))).map_err(AppError::bad_request)?,
        ),
        None => None,
    };
    let (limit, offset) = page(q.limit, q.offset);
    let conn = state.db.lock()?;
    let (records, total) = roster::list(
        &conn,
        &RecordFilter {
            group_name,
            section_number,
            registered: q.registered,
            query: q.q,
            limit,
            offset,
        },
    )?;
    Ok(Json(json!({ "records": records, "total": total, "limit": limit, "offset": offset })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportForm {
    pub records: Option<Vec<RawRecord>>,
    pub csv: Option<String>,
}

/// Accepts either JSON rows or pasted CSV/TSV. Valid rows are stored even
/// when others fail; the response lists every rejected line.
pub async fn import(
    State(state): State<AppState>,
    lang: Lang,
    AdminUser(admin): AdminUser,
    JsonBody(form): JsonBody<ImportForm>,
) -> Result<Json<Value>, AppError> {
    let parsed = match (form.records, form.csv) {
        (Some(rows), _) if !rows.is_empty() => roster_import::from_json(&rows),
        (_, Some(text)) if !text.trim().is_empty() => roster_import::from_text(&text),
        _ => return Err(AppError::bad_request(Msg::RosterImportEmpty)),
    };
    if parsed.records.is_empty() && parsed.errors.is_empty() {
        return Err(AppError::bad_request(Msg::RosterImportEmpty));
    }

    let conn = state.db.lock()?;
    let outcome = roster::import(&conn, &parsed.records)?;
    info!(
        event = "admin.roster_import",
        admin_id = %admin.user_id,
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        invalid = parsed.errors.len(),
        "roster imported"
    );
    let invalid: Vec<Value> = parsed
        .errors
        .iter()
        .map(|e| json!({ "line": e.line, "code": e.msg.code(), "error": e.msg.text(lang) }))
        .collect();
    Ok(Json(json!({
        "inserted": outcome.inserted,
        "duplicates": outcome.duplicates,
        "invalid": invalid,
    })))
}

pub async fn stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    Ok(Json(json!(roster::stats(&conn)?)))
}

pub async fn unregister(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    let removed_user = roster::unregister(&conn, &id)?
        .ok_or_else(|| AppError::not_found(Msg::RecordNotFound))?;
    let record = roster::find_by_id(&conn, &id)?;
    info!(
        event = "admin.roster_unregister",
        admin_id = %admin.user_id,
        record_id = %id,
        user_deleted = removed_user.is_some(),
        "roster record unregistered"
    );
    Ok(Json(json!({ "record": record, "deletedUserId": removed_user })))
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkDeleteForm {
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub all: bool,
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(form): JsonBody<BulkDeleteForm>,
) -> Result<Json<Value>, AppError> {
    let ids = match (form.all, form.ids) {
        (true, _) => None,
        (false, Some(ids)) if !ids.is_empty() => Some(ids),
        _ => return Err(AppError::bad_request(Msg::InvalidJson)),
    };
    let conn = state.db.lock()?;
    let out = roster::bulk_delete(&conn, ids.as_deref())?;
    info!(
        event = "admin.roster_bulk_delete",
        admin_id = %admin.user_id,
        records = out.records_deleted,
        users = out.users_deleted,
        "roster records deleted"
    );
    Ok(Json(json!({
        "recordsDeleted": out.records_deleted,
        "usersDeleted": out.users_deleted,
    })))
}
