//! Wire protocol for live connections.
//!
//! Every message in both directions is a JSON envelope `{"type": ..., "data": ...}`.
//! Client envelopes are parsed in two steps: the envelope first, then the
//! payload for the named type. That separates a garbled frame
//! ([`ProtocolError::Malformed`]), a type nobody knows
//! ([`ProtocolError::UnknownType`]) and a known command with bad fields
//! ([`ProtocolError::InvalidInput`]), which are handled differently.

use crate::stats::Stats;
use crate::types::{Doctor, DoctorId, DoctorStatus, Ticket, TicketStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors while turning a client frame into a [`Command`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not a JSON envelope with a string `type`
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Envelope type is not a known command
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// Known command whose `data` is missing fields or has wrong types
    #[error("Invalid {kind} payload: {reason}")]
    InvalidInput {
        /// Envelope type
        kind: String,
        /// What was wrong
        reason: String,
    },
}

/// Which snapshot a viewer asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotView {
    /// Current statistics
    Dashboard,
    /// Active tickets
    Tickets,
    /// All doctors
    Doctors,
}

/// A command for the queue, from a live connection or a REST call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register a patient for a doctor
    TakeTicket {
        /// Patient name; must not be blank
        patient_name: String,
        /// Complaint, empty when not given
        complaint: String,
        /// Doctor to queue for
        doctor_id: DoctorId,
    },
    /// Call the lowest-numbered waiting ticket
    CallNext,
    /// Call a ticket by number
    CallSpecific {
        /// Ticket number
        number: u64,
    },
    /// Change a ticket's status
    UpdateTicketStatus {
        /// Ticket number
        number: u64,
        /// Target status
        status: TicketStatus,
    },
    /// Manually override a doctor's availability
    UpdateDoctorStatus {
        /// Doctor id
        doctor_id: DoctorId,
        /// New availability
        status: DoctorStatus,
    },
    /// Ask for a private snapshot
    RequestSnapshot {
        /// Which snapshot
        view: SnapshotView,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeTicketData {
    patient_name: String,
    #[serde(default)]
    complaint: Option<String>,
    doctor_id: DoctorId,
}

#[derive(Deserialize)]
struct CallSpecificData {
    number: u64,
}

#[derive(Deserialize)]
struct TicketStatusData {
    number: u64,
    status: TicketStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoctorStatusData {
    doctor_id: DoctorId,
    status: DoctorStatus,
}

#[derive(Deserialize)]
struct SnapshotData {
    view: SnapshotView,
}

impl Command {
    /// Parse one text frame from a client
    ///
    /// # Errors
    ///
    /// See [`ProtocolError`] for the three failure classes.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Self::from_envelope(&envelope.kind, envelope.data)
    }

    fn from_envelope(kind: &str, data: Value) -> Result<Self, ProtocolError> {
        let command = match kind {
            "TAKE_TICKET" => {
                let data: TakeTicketData = payload(kind, data)?;
                Self::TakeTicket {
                    patient_name: data.patient_name,
                    complaint: data.complaint.unwrap_or_default(),
                    doctor_id: data.doctor_id,
                }
            },
            "CALL_NEXT" => Self::CallNext,
            "CALL_SPECIFIC" => {
                let data: CallSpecificData = payload(kind, data)?;
                Self::CallSpecific { number: data.number }
            },
            "UPDATE_TICKET_STATUS" => {
                let data: TicketStatusData = payload(kind, data)?;
                Self::UpdateTicketStatus {
                    number: data.number,
                    status: data.status,
                }
            },
            "UPDATE_DOCTOR_STATUS" => {
                let data: DoctorStatusData = payload(kind, data)?;
                Self::UpdateDoctorStatus {
                    doctor_id: data.doctor_id,
                    status: data.status,
                }
            },
            "REQUEST_SNAPSHOT" => {
                let data: SnapshotData = payload(kind, data)?;
                Self::RequestSnapshot { view: data.view }
            },
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(command)
    }

    /// Envelope type of this command
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TakeTicket { .. } => "TAKE_TICKET",
            Self::CallNext => "CALL_NEXT",
            Self::CallSpecific { .. } => "CALL_SPECIFIC",
            Self::UpdateTicketStatus { .. } => "UPDATE_TICKET_STATUS",
            Self::UpdateDoctorStatus { .. } => "UPDATE_DOCTOR_STATUS",
            Self::RequestSnapshot { .. } => "REQUEST_SNAPSHOT",
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidInput {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Snapshot sent privately to a viewer when it connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialData {
    /// Active tickets by ascending number
    pub tickets: Vec<Ticket>,
    /// All doctors by ascending id
    pub doctors: Vec<Doctor>,
    /// Current statistics
    pub stats: Stats,
}

/// Body of an `ERROR` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable reason
    pub message: String,
}

/// A message from the server to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Private greeting on connect
    InitialData(InitialData),
    /// A ticket was taken
    TicketCreated(Ticket),
    /// A ticket was called into a room
    TicketCalled(Ticket),
    /// A ticket's status changed
    StatusUpdated(Ticket),
    /// A doctor's availability changed
    DoctorStatus(Doctor),
    /// Fresh statistics (broadcast, or a private snapshot reply)
    DashboardUpdate(Stats),
    /// Private reply: active tickets
    TicketList(Vec<Ticket>),
    /// Private reply: all doctors
    DoctorList(Vec<Doctor>),
    /// Private reply: the command was rejected
    Error(ErrorBody),
}

impl ServerMessage {
    /// An `ERROR` message
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorBody {
            message: message.into(),
        })
    }

    /// Envelope type of this message
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InitialData(_) => "INITIAL_DATA",
            Self::TicketCreated(_) => "TICKET_CREATED",
            Self::TicketCalled(_) => "TICKET_CALLED",
            Self::StatusUpdated(_) => "STATUS_UPDATED",
            Self::DoctorStatus(_) => "DOCTOR_STATUS",
            Self::DashboardUpdate(_) => "DASHBOARD_UPDATE",
            Self::TicketList(_) => "TICKET_LIST",
            Self::DoctorList(_) => "DOCTOR_LIST",
            Self::Error(_) => "ERROR",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::default_roster;
    use serde_json::json;

    #[test]
    fn parses_take_ticket() {
        let command = Command::parse(
            r#"{"type":"TAKE_TICKET","data":{"patientName":"Budi","complaint":"Demam","doctorId":1}}"#,
        )
        .unwrap();

        assert_eq!(
            command,
            Command::TakeTicket {
                patient_name: "Budi".to_string(),
                complaint: "Demam".to_string(),
                doctor_id: DoctorId::new(1),
            }
        );
    }

    #[test]
    fn complaint_is_optional() {
        let command = Command::parse(
            r#"{"type":"TAKE_TICKET","data":{"patientName":"Budi","complaint":null,"doctorId":2}}"#,
        )
        .unwrap();
        assert!(matches!(command, Command::TakeTicket { ref complaint, .. } if complaint.is_empty()));
    }

    #[test]
    fn call_next_needs_no_data() {
        assert_eq!(Command::parse(r#"{"type":"CALL_NEXT"}"#).unwrap(), Command::CallNext);
        assert_eq!(Command::parse(r#"{"type":"CALL_NEXT","data":{}}"#).unwrap(), Command::CallNext);
    }

    #[test]
    fn parses_status_updates_and_snapshots() {
        assert_eq!(
            Command::parse(r#"{"type":"UPDATE_TICKET_STATUS","data":{"number":3,"status":"DONE"}}"#).unwrap(),
            Command::UpdateTicketStatus {
                number: 3,
                status: TicketStatus::Done,
            }
        );
        assert_eq!(
            Command::parse(r#"{"type":"UPDATE_DOCTOR_STATUS","data":{"doctorId":2,"status":"BUSY"}}"#).unwrap(),
            Command::UpdateDoctorStatus {
                doctor_id: DoctorId::new(2),
                status: DoctorStatus::Busy,
            }
        );
        assert_eq!(
            Command::parse(r#"{"type":"REQUEST_SNAPSHOT","data":{"view":"DOCTORS"}}"#).unwrap(),
            Command::RequestSnapshot {
                view: SnapshotView::Doctors,
            }
        );
    }

    #[test]
    fn error_classes() {
        assert!(matches!(Command::parse("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Command::parse(r#"{"data":{}}"#), Err(ProtocolError::Malformed(_))));
        assert_eq!(
            Command::parse(r#"{"type":"DANCE"}"#).unwrap_err(),
            ProtocolError::UnknownType("DANCE".to_string())
        );
        assert!(matches!(
            Command::parse(r#"{"type":"TAKE_TICKET","data":{"doctorId":1}}"#),
            Err(ProtocolError::InvalidInput { ref kind, .. }) if kind == "TAKE_TICKET"
        ));
        assert!(matches!(
            Command::parse(r#"{"type":"UPDATE_TICKET_STATUS","data":{"number":1,"status":"LOST"}}"#),
            Err(ProtocolError::InvalidInput { .. })
        ));
    }

    #[test]
    fn server_messages_use_type_and_data() {
        let doctor = default_roster().remove(0);
        let value = serde_json::to_value(ServerMessage::DoctorStatus(doctor)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "DOCTOR_STATUS",
                "data": {
                    "id": 1,
                    "name": "Dr. Andi",
                    "specialty": "Umum",
                    "room": "Ruang 101",
                    "status": "AVAILABLE"
                }
            })
        );

        let error = serde_json::to_value(ServerMessage::error("nope")).unwrap();
        assert_eq!(error, json!({"type": "ERROR", "data": {"message": "nope"}}));
    }

    #[test]
    fn kind_matches_serialized_type() {
        let messages = [
            ServerMessage::DashboardUpdate(Stats::default()),
            ServerMessage::TicketList(Vec::new()),
            ServerMessage::DoctorList(default_roster()),
            ServerMessage::InitialData(InitialData {
                tickets: Vec::new(),
                doctors: Vec::new(),
                stats: Stats::default(),
            }),
            ServerMessage::error("x"),
        ];
        for message in messages {
            let value = serde_json::to_value(&message).unwrap();
            assert_eq!(value["type"], message.kind());
        }
    }
}
