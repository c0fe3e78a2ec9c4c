//! # Clinic Queue Server
//!
//! Axum shell around the clinic queue: the live viewer endpoint, REST
//! adapters that map one-to-one onto queue commands, health and metrics.
//!
//! # Request Flow
//!
//! 1. A WebSocket frame or REST request arrives
//! 2. It is turned into a `Command`
//! 3. The dispatcher reduces it and delivers the resulting messages to every viewer
//! 4. Private replies go back to the requester (socket) or become the HTTP response
//!
//! # Example
//!
//! ```ignore
//! let config = Config::from_env()?;
//! let state = AppState::from_config(&config)?;
//! let app = build_router(state, &config.ws_path);
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::AppError;
pub use state::{AppState, QueueDispatcher};

use axum::{
    Router,
    routing::{get, post, put},
};
use handlers::{api, health, websocket};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the complete Axum router.
///
/// - `GET /health`
/// - `GET {ws_path}` live viewer connections
/// - `/api/...` REST adapters
/// - `GET /metrics` when a recorder is attached to the state
pub fn build_router(state: AppState, ws_path: &str) -> Router {
    let api_routes = Router::new()
        .route("/status", get(api::status))
        .route("/tickets", post(api::take_ticket))
        .route("/call", post(api::call))
        .route("/tickets/:number/status", put(api::update_ticket_status))
        .route("/doctors/:id/status", put(api::update_doctor_status));

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route(ws_path, get(websocket::handle))
        .nest("/api", api_routes);

    if state.metrics.is_some() {
        router = router.route("/metrics", get(health::metrics));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
