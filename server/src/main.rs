//! Clinic Queue Server
//!
//! Serves live queue updates over WebSocket and the equivalent REST endpoints.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:3000, viewers on /ws/queue
//! RUST_LOG=info,clinic_queue=debug cargo run --bin clinic-queue-server
//! ```

use anyhow::Context;
use clinic_queue_runtime::metrics::MetricsRecorder;
use clinic_queue_server::{AppState, Config, QueueDispatcher, build_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clinic_queue=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting clinic queue server...");

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        address = %config.bind_address(),
        ws_path = %config.ws_path,
        transitions = ?config.transitions,
        metrics = config.metrics_enabled,
        "Configuration loaded"
    );

    let mut state = AppState::from_config(&config).context("failed to seed the queue")?;
    if config.metrics_enabled {
        let mut recorder = MetricsRecorder::new();
        recorder.install().context("failed to install metrics recorder")?;
        state = state.with_metrics(recorder);
    }
    let dispatcher = state.dispatcher.clone();
    let app = build_router(state, &config.ws_path);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    tracing::info!(
        http = %format!("http://{}", config.bind_address()),
        websocket = %format!("ws://{}{}", config.bind_address(), config.ws_path),
        "Clinic queue server is running. Press Ctrl+C to shutdown"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dispatcher))
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C, after closing every viewer connection.
async fn shutdown_signal(dispatcher: QueueDispatcher) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutting down gracefully...");
    let closed = dispatcher.shutdown().await;
    tracing::info!(closed, "Viewer connections closed");
}
