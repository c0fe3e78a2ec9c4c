//! HTTP and WebSocket request handlers.

pub mod api;
pub mod health;
pub mod websocket;

pub use health::health_check;
