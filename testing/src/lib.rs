//! # Clinic Queue Testing
//!
//! Testing utilities and helpers for the clinic queue.
//!
//! This crate provides:
//! - Deterministic environment implementations (`FixedClock`, `SequentialIds`)
//! - The Given-When-Then [`ReducerTest`] harness and effect assertions
//! - Helpers to read what a connection received
//!
//! ## Example
//!
//! ```ignore
//! use clinic_queue_testing::{drain_frames, test_clock};
//!
//! #[tokio::test]
//! async fn viewer_sees_new_ticket() {
//!     let dispatcher = test_dispatcher();
//!     let (_, mut frames) = dispatcher.connect().await?;
//!
//!     dispatcher.send(take_ticket("Budi"), Origin::External).await?;
//!
//!     let received = drain_frames(&mut frames);
//!     assert_eq!(received[1]["type"], "TICKET_CREATED");
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use clinic_queue_core::environment::{Clock, IdGenerator};


/// Deterministic implementations of the environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, IdGenerator, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::set`] or
    /// [`FixedClock::advance`].
    ///
    /// # Example
    ///
    /// ```
    /// use clinic_queue_testing::mocks::FixedClock;
    /// use clinic_queue_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Jump to a specific time
        pub fn set(&self, time: DateTime<Utc>) {
            *self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = time;
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 09:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable ids: `00000000-0000-0000-0000-000000000001`, `...02`, ...
    #[derive(Debug, Default)]
    pub struct SequentialIds {
        next: AtomicU64,
    }

    impl SequentialIds {
        /// Start the sequence at 1
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }
    }

    impl IdGenerator for SequentialIds {
        fn next_id(&self) -> Uuid {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            Uuid::from_u128(u128::from(n))
        }
    }
}

/// Helpers for inspecting connection traffic
pub mod helpers {
    use clinic_queue_runtime::Frame;
    use serde_json::Value;
    use tokio::sync::mpsc;

    /// Take every frame already queued on a connection, parsed as JSON.
    ///
    /// Frames that are not valid JSON come back as `Value::Null`.
    pub fn drain_frames(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap_or(Value::Null));
        }
        frames
    }

    /// The `type` tags of a list of frames, in order
    #[must_use]
    pub fn frame_types(frames: &[Value]) -> Vec<String> {
        frames
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Install a test log subscriber honoring `RUST_LOG`. Safe to call repeatedly.
    pub fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::{drain_frames, frame_types, init_test_logging};
pub use mocks::{FixedClock, SequentialIds, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clinic_queue_core::ConnectionId;
    use clinic_queue_runtime::BroadcastHub;
    use serde_json::json;

    #[test]
    fn fixed_clock_is_stable_until_moved() {
        let clock = test_clock();
        let time1 = clock.now();
        assert_eq!(time1, clock.now());

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now() - time1, Duration::minutes(5));
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id().as_u128(), 1);
        assert_eq!(ids.next_id().as_u128(), 2);
    }

    #[test]
    fn drain_frames_parses_everything_queued() {
        let mut hub = BroadcastHub::default();
        let (id, mut rx) = hub.register();
        hub.broadcast(&json!({"type": "A"}));
        hub.send_to(id, &json!({"type": "B"}));
        assert_ne!(id, ConnectionId::new(0));

        let frames = drain_frames(&mut rx);
        assert_eq!(frame_types(&frames), vec!["A", "B"]);
        assert!(drain_frames(&mut rx).is_empty());
    }
}
