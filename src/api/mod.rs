//! HTTP surface: routing, extractors, error rendering and the handler
//! families.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::build_router;
pub use types::AppState;

use crate::i18n::Msg;
use crate::password;
use crate::tokens::Claims;
use crate::users::{self, User};
use error::AppError;
use rusqlite::Connection;

/// Runs Argon2 off the async workers.
pub(crate) async fn hash_password(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::internal(format!("hash task: {e}")))?
        .map_err(AppError::from)
}

pub(crate) async fn verify_password(plain: String, hash: Option<String>) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(h) => password::verify_password(&plain, &h),
        None => {
            password::verify_against_dummy(&plain);
            false
        }
    })
    .await
    .map_err(|e| AppError::internal(format!("verify task: {e}")))
}

/// Reloads the token's user; deleted users are 404 and disabled ones 403.
pub(crate) fn current_user(conn: &Connection, claims: &Claims) -> Result<User, AppError> {
    let user = users::find_by_id(conn, &claims.user_id)?
        .ok_or_else(|| AppError::not_found(Msg::UserNotFound))?;
    if !user.is_active {
        return Err(AppError::forbidden(Msg::AccountDisabled));
    }
    Ok(user)
}

pub(crate) const DEFAULT_PAGE: i64 = 50;
pub(crate) const MAX_PAGE: i64 = 500;

pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
        offset.unwrap_or(0).max(0),
    )
}
