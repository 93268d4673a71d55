use anyhow::Context;
use portald::analytics;
use portald::api::{build_router, AppState};
use portald::config::Config;
use portald::db::open_db;
use portald::mailer::LogMailer;
use portald::users::ensure_admin;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,portald=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("PORTAL_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let conn = open_db(&config.database_path)?;
    if let Some(admin) = &config.bootstrap_admin {
        ensure_admin(&conn, admin).context("failed to bootstrap admin account")?;
    }
    let mailer = Arc::new(LogMailer::new(config.mail_from.clone()));
    let addr = config.bind_addr;
    info!(
        address = %addr,
        database = %config.database_path.display(),
        "starting portal"
    );

    let state = AppState::new(config, conn, mailer);
    spawn_pruner(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("portal stopped");
    Ok(())
}

/// Drops idle rate-limit windows, expired reset codes and page views past
/// their retention.
fn spawn_pruner(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let limiter_keys = state.limiter.prune() + state.track_limiter.prune();
            let codes = state.codes.prune();
            let page_views = match prune_page_views(&state) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "page view pruning failed");
                    0
                }
            };
            if limiter_keys + codes + page_views > 0 {
                debug!(limiter_keys, codes, page_views, "pruned expired entries");
            }
        }
    });
}

fn prune_page_views(state: &AppState) -> anyhow::Result<usize> {
    let conn = state.db.lock()?;
    analytics::prune_page_views(&conn, state.config.page_view_retention_days)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
