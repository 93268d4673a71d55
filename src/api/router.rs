use super::handlers::{
    admin_analytics, admin_auth, admin_content, admin_notifications, admin_roster, admin_users,
    auth, core, student,
};
use super::middleware::{localize_errors, rate_limit_guard, track_rate_limit_guard};
use super::types::AppState;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    // Credential endpoints share the per-IP attempt budget.
    let guarded = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/admin/login", post(admin_auth::login))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_guard));

    let tracking = Router::new()
        .route("/api/analytics/track", post(core::track))
        .route_layer(from_fn_with_state(state.clone(), track_rate_limit_guard));

    let auth_routes = Router::new()
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/profile", put(auth::update_profile))
        .route("/api/auth/password", put(auth::change_password))
        .route("/api/admin/refresh", post(admin_auth::refresh))
        .route("/api/admin/logout", post(admin_auth::logout));

    let admin = Router::new()
        .route(
            "/api/admin/users",
            get(admin_users::list).post(admin_users::create),
        )
        .route(
            "/api/admin/users/:id",
            get(admin_users::get_one)
                .put(admin_users::update)
                .delete(admin_users::delete),
        )
        .route("/api/admin/roster", get(admin_roster::list))
        .route("/api/admin/roster/import", post(admin_roster::import))
        .route("/api/admin/roster/stats", get(admin_roster::stats))
        .route("/api/admin/roster/bulk-delete", post(admin_roster::bulk_delete))
        .route("/api/admin/roster/:id/unregister", post(admin_roster::unregister))
        .route(
            "/api/admin/articles",
            get(admin_content::list_articles).post(admin_content::create_article),
        )
        .route(
            "/api/admin/articles/:id",
            put(admin_content::update_article).delete(admin_content::delete_article),
        )
        .route(
            "/api/admin/tasks",
            get(admin_content::list_tasks).post(admin_content::create_task),
        )
        .route(
            "/api/admin/tasks/:id",
            put(admin_content::update_task).delete(admin_content::delete_task),
        )
        .route(
            "/api/admin/schedule",
            get(admin_content::list_schedule).post(admin_content::create_schedule),
        )
        .route(
            "/api/admin/schedule/:id",
            put(admin_content::update_schedule).delete(admin_content::delete_schedule),
        )
        .route(
            "/api/admin/notifications",
            get(admin_notifications::history).post(admin_notifications::send),
        )
        .route("/api/admin/analytics", get(admin_analytics::summary))
        .route("/api/admin/backup", get(admin_analytics::download_backup));

    let students = Router::new()
        .route("/api/student/dashboard", get(student::dashboard))
        .route("/api/student/schedule", get(student::schedule))
        .route("/api/student/articles", get(student::list_articles))
        .route("/api/student/articles/:id", get(student::get_article))
        .route("/api/student/tasks", get(student::list_tasks))
        .route(
            "/api/student/tasks/:id/complete",
            post(student::complete_task).delete(student::uncomplete_task),
        );

    Router::new()
        .route("/api/health", get(core::health))
        .merge(guarded)
        .merge(tracking)
        .merge(auth_routes)
        .merge(admin)
        .merge(students)
        .fallback(core::not_found)
        // Inside `localize_errors` so its 413 gets the JSON error body.
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(from_fn(localize_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
