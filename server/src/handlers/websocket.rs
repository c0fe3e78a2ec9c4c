//! Live viewer connections.
//!
//! # Architecture
//!
//! ```text
//! Client          WebSocket Handler          Dispatcher
//!   │                    │                       │
//!   ├─ Connect ─────────>│                       │
//!   │                    ├─ connect() ──────────>│
//!   │<─ INITIAL_DATA ────┤<── frame ─────────────┤
//!   │                    │                       │
//!   ├─ {type, data} ────>│                       │
//!   │                    ├─ send() ─────────────>│
//!   │                    │<── broadcast frames ──┤
//!   │<─ events ──────────┤                       │
//! ```
//!
//! Each connection runs two tasks. The writer drains the connection's
//! outbound channel into the socket; the reader parses client frames and
//! dispatches them. When either side ends, the connection is unregistered.
//!
//! Unparseable frames and unknown types are logged and dropped. A known
//! command with bad fields gets a private `ERROR` reply.

use crate::state::{AppState, QueueDispatcher};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use clinic_queue::{Command, ProtocolError, ServerMessage};
use clinic_queue_core::ConnectionId;
use clinic_queue_runtime::{DispatchError, Origin};
use futures::{SinkExt, stream::StreamExt};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

/// Upgrade to a live viewer connection.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    debug!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state.dispatcher))
}

/// Handle WebSocket connection lifecycle.
async fn handle_socket(socket: WebSocket, dispatcher: QueueDispatcher) {
    let (id, mut frames) = match dispatcher.connect().await {
        Ok(registered) => registered,
        Err(error) => {
            warn!(%error, "Refused viewer connection");
            return;
        },
    };
    let live = dispatcher.connection_count().await;
    info!(connection = %id, live, "Viewer connected");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                // Client disconnected
                break;
            }
        }
        // Channel closed: unregistered by the hub or shutting down
        let _ = sender.close().await;
        debug!(connection = %id, "WebSocket send task terminated");
    });

    let commands = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if handle_text(&commands, id, &text).await.is_break() {
                        break;
                    }
                },
                Message::Binary(_) => {
                    warn!(connection = %id, "Received unexpected binary message");
                },
                Message::Ping(_) | Message::Pong(_) => {},
                Message::Close(_) => {
                    debug!(connection = %id, "Client requested close");
                    break;
                },
            }
        }
        debug!(connection = %id, "WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    dispatcher.disconnect(id).await;
    let live = dispatcher.connection_count().await;
    info!(connection = %id, live, "Viewer disconnected");
}

/// Parse and dispatch one client frame.
///
/// Breaks only when the dispatcher no longer accepts commands.
async fn handle_text(dispatcher: &QueueDispatcher, id: ConnectionId, text: &str) -> ControlFlow<()> {
    match Command::parse(text) {
        Ok(command) => {
            debug!(connection = %id, command = command.kind(), "Received command");
            match dispatcher.send(command, Origin::Connection(id)).await {
                Ok(_) => ControlFlow::Continue(()),
                Err(DispatchError::ShuttingDown) => ControlFlow::Break(()),
            }
        },
        Err(error @ ProtocolError::InvalidInput { .. }) => {
            debug!(connection = %id, %error, "Rejected command input");
            dispatcher.notify(id, &ServerMessage::error(error.to_string())).await;
            ControlFlow::Continue(())
        },
        Err(error) => {
            warn!(connection = %id, %error, "Dropped client message");
            ControlFlow::Continue(())
        },
    }
}
