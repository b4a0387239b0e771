use tracing_subscriber::EnvFilter;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod memory;
mod sessions;
mod state;
mod users;

const DEFAULT_LOG_FILTER: &str = "auth_service=debug,axum=info,tower_http=info";

/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.with_target(false).json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = state::AppState::init().await?;
    tracing::info!(
        issuer = %state.config.jwt.issuer,
        access_ttl_secs = state.config.jwt.access_ttl_seconds,
        refresh_ttl_secs = state.config.jwt.refresh_ttl_seconds,
        "auth service configured"
    );
    app::serve(app::build_app(state)).await
}
