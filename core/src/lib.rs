//! # Clinic Queue Core
//!
//! Core traits and types shared by every crate of the clinic queue.
//!
//! The queue is built as a functional core with an imperative shell:
//!
//! - **State**: the queue store (tickets and doctors)
//! - **Action**: a command received from a viewer or an external call
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of what must be delivered to viewers
//!   (broadcast to everyone, or a private reply to the requester)
//! - **Environment**: injected clock and id source
//!
//! The runtime crate owns the imperative part: it serializes commands,
//! runs the reducer and delivers the effects through the broadcast hub.
//!
//! ## Example
//!
//! ```ignore
//! impl Reducer for QueueReducer {
//!     type State = QueueStore;
//!     type Action = Command;
//!     type Event = ServerMessage;
//!     type Environment = QueueEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut QueueStore,
//!         action: Command,
//!         env: &QueueEnvironment,
//!     ) -> SmallVec<[Effect<ServerMessage>; 4]> {
//!         // Business logic goes here
//!         SmallVec::new()
//!     }
//! }
//! ```

// Re-export commonly used types
pub use smallvec::{SmallVec, smallvec};

/// Effects returned by a single reduce call.
///
/// Four inline slots cover the longest command (a call produces four broadcasts).
pub type Effects<E> = SmallVec<[effect::Effect<E>; 4]>;

/// Connection identity for live viewer sessions.
pub mod connection {
    use serde::{Deserialize, Serialize};

    /// Identifier of one live viewer connection.
    ///
    /// Assigned by the broadcast hub on registration and never reused
    /// for the lifetime of the process.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ConnectionId(u64);

    impl ConnectionId {
        /// Wrap a raw connection number
        #[must_use]
        pub const fn new(id: u64) -> Self {
            Self(id)
        }
    }

    impl std::fmt::Display for ConnectionId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "conn-{}", self.0)
        }
    }
}

/// Reducer module - the core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::Effects;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The command type this reducer processes
    /// - `Event`: The outbound message type delivered to viewers
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The message type carried by effects
        type Event;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns, in delivery order, the effects to be executed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effects<Self::Event>;

        /// Message sent privately to a viewer when it registers
        ///
        /// Defaults to nothing.
        fn on_connect(&self, _state: &Self::State, _env: &Self::Environment) -> Option<Self::Event> {
            None
        }
    }
}

/// Effect module - delivery descriptions
///
/// Effects are values, not execution. The runtime executes them in the
/// order the reducer returned them.
pub mod effect {
    /// Effect type - describes a delivery to be performed by the runtime
    #[derive(Clone, Debug, PartialEq)]
    pub enum Effect<Event> {
        /// No-op effect
        None,

        /// Deliver the event to every registered connection
        Broadcast(Event),

        /// Deliver the event only to the originator of the command
        Reply(Event),
    }

    impl<Event> Effect<Event> {
        /// The event carried by this effect, if any
        #[must_use]
        pub const fn event(&self) -> Option<&Event> {
            match self {
                Effect::None => None,
                Effect::Broadcast(event) | Effect::Reply(event) => Some(event),
            }
        }

        /// Whether this effect fans out to every connection
        #[must_use]
        pub const fn is_broadcast(&self) -> bool {
            matches!(self, Effect::Broadcast(_))
        }

        /// Whether this effect is a private reply
        #[must_use]
        pub const fn is_reply(&self) -> bool {
            matches!(self, Effect::Reply(_))
        }
    }
}

/// Environment module - dependency injection traits
///
/// All external dependencies (time, identifiers) are abstracted behind
/// traits and injected via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of opaque identifiers for newly created tickets
    pub trait IdGenerator: Send + Sync {
        /// Produce an identifier that has never been returned before
        fn next_id(&self) -> Uuid;
    }

    /// Production id source (random v4 UUIDs)
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RandomIds;

    impl IdGenerator for RandomIds {
        fn next_id(&self) -> Uuid {
            Uuid::new_v4()
        }
    }
}

pub use connection::ConnectionId;

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{IdGenerator, RandomIds};
    use super::ConnectionId;

    #[test]
    fn effect_accessors() {
        let broadcast = Effect::Broadcast(1);
        let reply = Effect::Reply(2);
        let none = Effect::<i32>::None;

        assert!(broadcast.is_broadcast());
        assert!(!broadcast.is_reply());
        assert!(reply.is_reply());
        assert_eq!(broadcast.event(), Some(&1));
        assert_eq!(reply.event(), Some(&2));
        assert_eq!(none.event(), None);
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn random_ids_are_distinct() {
        let ids = RandomIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
