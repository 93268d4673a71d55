use crate::api::error::AppError;
use crate::api::extract::{AdminUser, JsonBody};
use crate::api::types::AppState;
use crate::notifications::{self, NotificationInput};
use crate::users;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

const HISTORY_LIMIT: i64 = 100;

/// Emails every active user matching the audience. Delivery failures only
/// show up in the counts.
pub async fn send(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<NotificationInput>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let msg = notifications::check(&input).map_err(AppError::bad_request)?;
    let recipients = {
        let conn = state.db.lock()?;
        users::active_recipients(
            &conn,
            msg.audience.role,
            msg.audience.group_name,
            msg.audience.section_number,
        )?
    };

    let mailer = state.mailer.clone();
    let delivery = {
        let recipients = recipients.clone();
        let msg = msg.clone();
        tokio::task::spawn_blocking(move || {
            notifications::deliver(mailer.as_ref(), &recipients, &msg)
        })
        .await
        .map_err(|e| AppError::internal(format!("mail task: {e}")))?
    };

    let conn = state.db.lock()?;
    let notification =
        notifications::record(&conn, &msg, recipients.len(), delivery, Some(&admin.user_id))?;
    info!(
        event = "admin.notification_sent",
        admin_id = %admin.user_id,
        notification_id = %notification.id,
        recipients = recipients.len(),
        sent = delivery.sent,
        failed = delivery.failed,
        "notification sent"
    );
    Ok((StatusCode::CREATED, Json(json!({ "notification": notification }))))
}

pub async fn history(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db.lock()?;
    Ok(Json(json!({ "notifications": notifications::list(&conn, HISTORY_LIMIT)? })))
}
