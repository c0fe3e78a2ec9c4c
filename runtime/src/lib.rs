//! # Clinic Queue Runtime
//!
//! Runtime for the clinic queue: the [`Dispatcher`] that serializes commands
//! and the [`BroadcastHub`] that fans their results out to every viewer.
//!
//! ## Core Components
//!
//! - **Dispatcher**: owns the queue state and the hub behind one lock, runs
//!   the reducer and delivers its effects before the next command starts
//! - **Broadcast hub**: registry of live connections with removal-on-failure
//!
//! ## Example
//!
//! ```ignore
//! use clinic_queue_runtime::{Dispatcher, Origin};
//!
//! let dispatcher = Dispatcher::new(initial_state, my_reducer, environment);
//!
//! // A viewer connects and gets its private greeting
//! let (id, frames) = dispatcher.connect().await?;
//!
//! // Dispatch a command on behalf of that viewer
//! dispatcher.send(command, Origin::Connection(id)).await?;
//!
//! // Read state
//! let value = dispatcher.state(|s| s.some_field).await;
//! ```

/// Broadcast hub (connection registry and fan-out)
pub mod hub;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the dispatcher
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during dispatcher operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum DispatchError {
        /// Dispatcher is shutting down and not accepting new commands
        ///
        /// Returned by `send()` and `connect()` after `shutdown()` was called.
        #[error("Dispatcher is shutting down")]
        ShuttingDown,
    }
}

pub use dispatcher::{Dispatched, Dispatcher, DispatcherConfig, Origin};
pub use error::DispatchError;
pub use hub::{BroadcastHub, DEFAULT_CONNECTION_BUFFER, Frame};

/// Dispatcher module - the runtime for reducers
pub mod dispatcher {
    use super::hub::{BroadcastHub, DEFAULT_CONNECTION_BUFFER, Frame};
    use super::metrics::DispatcherMetrics;
    use super::DispatchError;
    use clinic_queue_core::{ConnectionId, effect::Effect, reducer::Reducer};
    use serde::Serialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{Mutex, mpsc};

    /// Where a command came from
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Origin {
        /// A live viewer connection; private replies are delivered to it
        Connection(ConnectionId),
        /// An external point-in-time call; private replies are returned
        External,
    }

    /// Outcome of one dispatched command
    #[derive(Debug)]
    pub struct Dispatched<E> {
        /// Number of events broadcast to all connections
        pub broadcasts: usize,
        /// Private replies for an [`Origin::External`] caller
        ///
        /// Always empty for connection origins, whose replies travel
        /// through the hub instead.
        pub replies: Vec<E>,
    }

    impl<E> Dispatched<E> {
        /// Whether the command produced no event at all
        #[must_use]
        pub fn is_no_op(&self) -> bool {
            self.broadcasts == 0 && self.replies.is_empty()
        }
    }

    /// Configuration for [`Dispatcher`] instances
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DispatcherConfig {
        /// Outbound buffer per connection, in frames
        pub connection_buffer: usize,
    }

    impl DispatcherConfig {
        /// Set the per-connection outbound buffer
        #[must_use]
        pub const fn with_connection_buffer(mut self, frames: usize) -> Self {
            self.connection_buffer = frames;
            self
        }
    }

    impl Default for DispatcherConfig {
        fn default() -> Self {
            Self {
                connection_buffer: DEFAULT_CONNECTION_BUFFER,
            }
        }
    }

    /// State and connection set, guarded together.
    struct Shared<S> {
        state: S,
        hub: BroadcastHub,
    }

    /// The Dispatcher - serialized runtime for a reducer
    ///
    /// The Dispatcher manages:
    /// 1. State and the broadcast hub, behind a single async mutex
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect delivery, completed before the lock is released
    ///
    /// Commands never interleave: two concurrent `send()` calls run one
    /// after the other, and every connection observes the events of each
    /// command contiguously and in reducer order.
    pub struct Dispatcher<R>
    where
        R: Reducer,
    {
        shared: Arc<Mutex<Shared<R::State>>>,
        reducer: Arc<R>,
        environment: Arc<R::Environment>,
        shutdown: Arc<AtomicBool>,
    }

    impl<R: Reducer> Clone for Dispatcher<R> {
        fn clone(&self) -> Self {
            Self {
                shared: Arc::clone(&self.shared),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
            }
        }
    }

    impl<R> Dispatcher<R>
    where
        R: Reducer,
        R::Event: Serialize,
    {
        /// Create a new dispatcher with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: R::State, reducer: R, environment: R::Environment) -> Self {
            Self::with_config(initial_state, reducer, environment, DispatcherConfig::default())
        }

        /// Create a new dispatcher with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: R::State,
            reducer: R,
            environment: R::Environment,
            config: DispatcherConfig,
        ) -> Self {
            Self {
                shared: Arc::new(Mutex::new(Shared {
                    state: initial_state,
                    hub: BroadcastHub::new(config.connection_buffer),
                })),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Register a new viewer connection.
        ///
        /// The reducer's `on_connect` greeting is queued on the new
        /// connection before any later broadcast can reach it.
        ///
        /// # Errors
        ///
        /// Returns [`DispatchError::ShuttingDown`] after `shutdown()`.
        pub async fn connect(&self) -> Result<(ConnectionId, mpsc::Receiver<Frame>), DispatchError> {
            if self.is_shutting_down() {
                return Err(DispatchError::ShuttingDown);
            }

            let mut shared = self.shared.lock().await;
            let Shared { state, hub } = &mut *shared;

            let (id, rx) = hub.register();
            if let Some(greeting) = self.reducer.on_connect(state, &self.environment) {
                hub.send_to(id, &greeting);
            }
            Ok((id, rx))
        }

        /// Unregister a connection. Idempotent.
        pub async fn disconnect(&self, id: ConnectionId) -> bool {
            self.shared.lock().await.hub.unregister(id)
        }

        /// Deliver an event to one connection without running the reducer.
        ///
        /// Used for replies to input that never became a command.
        pub async fn notify(&self, id: ConnectionId, event: &R::Event) -> bool {
            self.shared.lock().await.hub.send_to(id, event)
        }

        /// Dispatch a command
        ///
        /// This method:
        /// 1. Acquires the lock on state and hub
        /// 2. Calls the reducer with (state, action, environment)
        /// 3. Delivers the returned effects in order
        /// 4. Releases the lock
        ///
        /// Delivery failures never surface here; the hub logs them and
        /// drops the failing connection.
        ///
        /// # Errors
        ///
        /// Returns [`DispatchError::ShuttingDown`] if the dispatcher is shutting down.
        #[tracing::instrument(skip(self, action), name = "dispatch")]
        pub async fn send(&self, action: R::Action, origin: Origin) -> Result<Dispatched<R::Event>, DispatchError> {
            if self.is_shutting_down() {
                tracing::warn!("Rejected command: dispatcher is shutting down");
                DispatcherMetrics::record_rejection();
                return Err(DispatchError::ShuttingDown);
            }

            let mut shared = self.shared.lock().await;
            let Shared { state, hub } = &mut *shared;

            let start = std::time::Instant::now();
            let effects = self.reducer.reduce(state, action, &self.environment);
            DispatcherMetrics::record_command(start.elapsed());
            tracing::trace!("Reducer returned {} effects", effects.len());

            let mut outcome = Dispatched {
                broadcasts: 0,
                replies: Vec::new(),
            };
            for effect in effects {
                match effect {
                    Effect::None => {},
                    Effect::Broadcast(event) => {
                        hub.broadcast(&event);
                        outcome.broadcasts += 1;
                    },
                    Effect::Reply(event) => match origin {
                        Origin::Connection(id) => {
                            hub.send_to(id, &event);
                        },
                        Origin::External => outcome.replies.push(event),
                    },
                }
            }

            Ok(outcome)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let waiting = dispatcher.state(|s| s.find_active_tickets().len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&R::State) -> T,
        {
            let shared = self.shared.lock().await;
            f(&shared.state)
        }

        /// Number of registered connections
        pub async fn connection_count(&self) -> usize {
            self.shared.lock().await.hub.len()
        }

        /// Whether `shutdown()` has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Stop accepting commands and drop every connection.
        ///
        /// Returns the number of connections that were closed.
        pub async fn shutdown(&self) -> usize {
            self.shutdown.store(true, Ordering::Release);
            let closed = self.shared.lock().await.hub.close_all();
            tracing::info!(closed, "Dispatcher shut down");
            closed
        }
    }
}
