//! guest-presence server entry point.
//!
//! Starts the Axum HTTP server with the guest-count REST and WebSocket
//! endpoints.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use guest_presence::app_state::AppState;
use guest_presence::config::{LogFormat, ServerConfig};
use guest_presence::server::build_app;
use guest_presence::shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env().context("invalid server configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    tracing::info!(
        addr = %config.listen_addr,
        public_url = %config.public_url,
        production = config.is_production(),
        "starting guest-presence"
    );

    // Build application state and router
    let state = AppState::new(&config);
    let connections = state.shutdown.clone();
    let app = build_app(state, &config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::os_signal().await;
            connections.trigger();
        })
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}
