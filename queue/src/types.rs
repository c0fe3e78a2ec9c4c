//! Domain types for the clinic queue.
//!
//! Tickets and doctors are plain data. Every mutation goes through
//! [`QueueStore`](crate::store::QueueStore); the fields are public so views
//! and tests can read them, not so other components can write them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique, opaque identifier of a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a `TicketId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a pre-provisioned doctor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorId(u32);

impl DoctorId {
    /// Wrap a raw doctor number
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DoctorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a ticket: `WAITING` → `SERVING` → `DONE`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// In the queue, not called yet
    Waiting,
    /// Called into a room
    Serving,
    /// Finished (terminal)
    Done,
}

impl TicketStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Serving => "SERVING",
            Self::Done => "DONE",
        }
    }

    /// Whether the ticket still shows in the active queue
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of a doctor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoctorStatus {
    /// Free to take the next patient
    #[default]
    Available,
    /// Serving a patient
    Busy,
}

impl DoctorStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Busy => "BUSY",
        }
    }
}

impl std::fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numbered place in the queue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Opaque identifier, never reused
    pub id: TicketId,
    /// Queue number, strictly increasing in creation order
    pub number: u64,
    /// Name of the patient
    pub patient_name: String,
    /// Free-text complaint, empty when not given
    pub complaint: String,
    /// Doctor the ticket was taken for; fixed at creation
    pub doctor_id: DoctorId,
    /// Doctor name at creation time
    pub doctor_name: String,
    /// Room of the doctor at creation time
    pub room: String,
    /// Current lifecycle status
    pub status: TicketStatus,
    /// When the ticket was taken
    pub registered_at: DateTime<Utc>,
    /// When the ticket was first called
    pub called_at: Option<DateTime<Utc>>,
    /// When the ticket was completed
    pub completed_at: Option<DateTime<Utc>>,
}

/// A pre-provisioned doctor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    /// Stable identifier
    pub id: DoctorId,
    /// Display name
    pub name: String,
    /// Specialty, e.g. "Umum"
    pub specialty: String,
    /// Consultation room
    pub room: String,
    /// Current availability
    #[serde(default)]
    pub status: DoctorStatus,
}

impl Doctor {
    /// Creates an available doctor
    #[must_use]
    pub fn new(
        id: DoctorId,
        name: impl Into<String>,
        specialty: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            specialty: specialty.into(),
            room: room.into(),
            status: DoctorStatus::Available,
        }
    }
}

/// The roster used when no roster file is configured
#[must_use]
pub fn default_roster() -> Vec<Doctor> {
    vec![
        Doctor::new(DoctorId::new(1), "Dr. Andi", "Umum", "Ruang 101"),
        Doctor::new(DoctorId::new(2), "Dr. Sinta", "Anak", "Ruang 102"),
    ]
}
