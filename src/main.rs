mod app;
mod auth;
mod config;
mod db;
mod error;
mod images;
mod mail;
mod posts;
mod questions;
mod state;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "deutschify=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    db::migrate(&app_state.db).await?;
    db::ensure_anonymous_user(app_state.auth.users().as_ref()).await?;

    let session_cfg = &app_state.config.session;
    auth::session::spawn_sweeper(
        app_state.auth.sessions().clone(),
        std::time::Duration::from_secs(session_cfg.sweep_interval_seconds),
    );
    tracing::info!(
        session_backend = ?session_cfg.backend,
        ttl_seconds = session_cfg.ttl_seconds,
        sweep_seconds = session_cfg.sweep_interval_seconds,
        mail_transport = ?app_state.config.mail.transport,
        "sessions configured"
    );

    app::serve(app::build_app(app_state)).await
}
