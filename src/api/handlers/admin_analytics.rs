use crate::analytics;
use crate::api::error::AppError;
use crate::api::extract::AdminUser;
use crate::api::types::AppState;
use crate::backup;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

pub async fn summary(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    Ok(Json(json!(analytics::summary(&conn)?)))
}

pub async fn download_backup(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Response, AppError> {
    let (bytes, summary) = {
        let conn = state.db.lock()?;
        backup::export_portal_bundle(&conn)?
    };
    info!(
        event = "admin.backup_exported",
        admin_id = %admin.user_id,
        bytes = bytes.len(),
        entries = summary.entry_count,
        "backup exported"
    );
    let filename = format!(
        "attachment; filename=\"portal-backup-{}.zip\"",
        Utc::now().format("%Y%m%d-%H%M%S")
    );
    Ok((
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (CONTENT_DISPOSITION, filename),
        ],
        bytes,
    )
        .into_response())
}
