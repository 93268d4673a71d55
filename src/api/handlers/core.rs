use crate::analytics;
use crate::api::error::AppError;
use crate::api::extract::{JsonBody, MaybeUser};
use crate::api::types::AppState;
use crate::i18n::Msg;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db.lock() {
        Ok(conn) => match conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)) {
            Ok(_) => "ok",
            Err(e) => {
                warn!(event = "health.db_failed", error = %e, "database check failed");
                "error"
            }
        },
        Err(_) => "error",
    };
    Json(json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackForm {
    pub path: Option<String>,
}

pub async fn track(
    State(state): State<AppState>,
    MaybeUser(claims): MaybeUser,
    JsonBody(form): JsonBody<TrackForm>,
) -> Result<StatusCode, AppError> {
    let path = analytics::check_path(form.path.as_deref()).map_err(AppError::bad_request)?;
    let conn = state.db.lock()?;
    analytics::track(&conn, &path, claims.as_ref().map(|c| c.user_id.as_str()))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn not_found() -> AppError {
    AppError::not_found(Msg::RouteNotFound)
}
