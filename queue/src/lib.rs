//! # Clinic Queue
//!
//! Ticketing queue for a clinic with live updates for every viewer.
//!
//! - [`types`]: tickets, doctors and their statuses
//! - [`store`]: the [`QueueStore`] and its transition table
//! - [`stats`]: same-day dashboard counters
//! - [`protocol`]: `{type, data}` envelopes in both directions
//! - [`reducer`]: the [`QueueReducer`] that ties them together
//!
//! The reducer runs inside a `clinic_queue_runtime::Dispatcher`, which
//! serializes commands and delivers the resulting messages.
//!
//! ## Example
//!
//! ```ignore
//! use clinic_queue::{Command, QueueEnvironment, QueueReducer, QueueStore};
//! use clinic_queue_runtime::{Dispatcher, Origin};
//!
//! let dispatcher = Dispatcher::new(
//!     QueueStore::with_default_roster(),
//!     QueueReducer::new(),
//!     QueueEnvironment::production(),
//! );
//! dispatcher.send(Command::CallNext, Origin::External).await?;
//! ```

pub mod protocol;
pub mod reducer;
pub mod stats;
pub mod store;
pub mod types;

pub use protocol::{Command, ErrorBody, InitialData, ProtocolError, ServerMessage, SnapshotView};
pub use reducer::{QueueEnvironment, QueueReducer};
pub use stats::{Stats, compute_statistics, compute_statistics_in};
pub use store::{QueueError, QueueStore, TransitionPolicy, Trigger, UnknownPolicy};
pub use types::{Doctor, DoctorId, DoctorStatus, Ticket, TicketId, TicketStatus, default_roster};
