//! Broadcast hub: the registry of live viewer connections.
//!
//! Every connection owns a bounded outbound channel. The hub never awaits:
//! delivery uses `try_send`, so a slow or closed viewer cannot stall the
//! others. A failed delivery unregisters the connection on the spot.
//!
//! The hub is not synchronized on its own. The dispatcher keeps it behind
//! the same lock as the queue state, which is what makes the event order of
//! one command identical for every viewer.

use crate::metrics::HubMetrics;
use clinic_queue_core::ConnectionId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// A serialized message, shared between all recipients of one broadcast.
pub type Frame = Arc<str>;

/// Default per-connection outbound buffer, in frames.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// Registry of live connections with fan-out delivery.
#[derive(Debug)]
pub struct BroadcastHub {
    connections: BTreeMap<ConnectionId, mpsc::Sender<Frame>>,
    next_id: u64,
    buffer: usize,
}

impl BroadcastHub {
    /// Create an empty hub whose connections buffer up to `buffer` frames
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: BTreeMap::new(),
            next_id: 1,
            buffer: buffer.max(1),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the connection id and the receiving end of its outbound
    /// channel. The transport drains the receiver into the socket.
    pub fn register(&mut self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::channel(self.buffer);
        self.connections.insert(id, tx);
        HubMetrics::record_connections(self.connections.len());

        tracing::info!(connection = %id, total = self.connections.len(), "Connection registered");
        (id, rx)
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            HubMetrics::record_connections(self.connections.len());
            tracing::info!(connection = %id, total = self.connections.len(), "Connection unregistered");
        }
        removed
    }

    /// Whether the connection is currently registered
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of registered connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Deliver an event to every registered connection.
    ///
    /// The event is serialized once. Connections that cannot take the frame
    /// are unregistered. Returns the number of successful deliveries.
    pub fn broadcast<E: Serialize>(&mut self, event: &E) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let mut failed = Vec::new();
        let mut delivered = 0;
        for (id, tx) in &self.connections {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    log_failure(*id, &error);
                    failed.push(*id);
                },
            }
        }

        for id in failed {
            HubMetrics::record_delivery_failure();
            self.unregister(id);
        }

        HubMetrics::record_broadcast(delivered);
        tracing::debug!(recipients = delivered, "Broadcast delivered");
        delivered
    }

    /// Deliver an event to a single connection.
    ///
    /// Returns `false` if the connection is unknown or the delivery failed,
    /// in which case the connection is unregistered.
    pub fn send_to<E: Serialize>(&mut self, id: ConnectionId, event: &E) -> bool {
        let Some(tx) = self.connections.get(&id) else {
            tracing::debug!(connection = %id, "Private message dropped: connection not registered");
            return false;
        };
        let Some(frame) = encode(event) else {
            return false;
        };

        match tx.try_send(frame) {
            Ok(()) => {
                HubMetrics::record_reply();
                true
            },
            Err(error) => {
                log_failure(id, &error);
                HubMetrics::record_delivery_failure();
                self.unregister(id);
                false
            },
        }
    }

    /// Drop every connection. Their writer tasks see the channel close.
    pub fn close_all(&mut self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        HubMetrics::record_connections(0);
        count
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTION_BUFFER)
    }
}

fn encode<E: Serialize>(event: &E) -> Option<Frame> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Frame::from(json)),
        Err(error) => {
            tracing::error!(%error, "Failed to serialize outbound event");
            None
        },
    }
}

fn log_failure(id: ConnectionId, error: &TrySendError<Frame>) {
    match error {
        TrySendError::Full(_) => {
            tracing::warn!(connection = %id, "Outbound buffer full, dropping slow connection");
        },
        TrySendError::Closed(_) => {
            tracing::debug!(connection = %id, "Connection closed, unregistering");
        },
    }
}
