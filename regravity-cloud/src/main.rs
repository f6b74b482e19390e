//! regravity-cloud: trade intermediation service
//!
//! Long-running service that:
//! - Creates trade orders and standalone service orders (JWT authenticated)
//! - Stores buyer change requests, degrading to an admin email when storage fails
//! - Issues and checks email verification codes
//! - Delivers every notification through EmailJS with ordered fallback strategies
//! - Serves dashboard analytics

mod analytics;
mod api;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod fallback;
mod orders;
mod state;
#[cfg(test)]
mod testing;
mod verification;

use std::net::SocketAddr;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regravity_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Refuse to start with template ids that cannot serve every strategy
    config.validate_templates()?;

    tracing::info!(
        production = config.is_production(),
        "Starting regravity-cloud (env: {})",
        config.environment
    );

    // Initialize application state
    let state = AppState::new(&config).await?;
    email::notification::validate_strategy_tables(state.notifier.routing())?;

    let app = api::create_router(state.clone());

    // Periodic cleanup (every 5 minutes): rate limit windows, expired codes
    let rate_limiter = state.rate_limiter.clone();
    let verification = state.verification.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup();
            verification.prune_expired(shared::util::now_millis());
        }
    });

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("regravity-cloud HTTP listening on {http_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Let in-flight notifications finish
    state.tracker.close();
    tracing::info!(pending = state.tracker.len(), "Waiting for background notifications");
    state.tracker.wait().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        // Without a signal handler, run until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
