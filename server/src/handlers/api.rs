//! REST adapters for the queue.
//!
//! Each endpoint maps to exactly one queue command and triggers the same
//! broadcasts as the equivalent WebSocket message:
//! - GET /api/status - Server status with live client count and statistics
//! - POST /api/tickets - Take a ticket
//! - POST /api/call - Call the next ticket, or a specific number
//! - PUT /api/tickets/:number/status - Update a ticket's status
//! - PUT /api/doctors/:id/status - Override a doctor's availability

use crate::{AppError, WebResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use clinic_queue::{Command, DoctorId, DoctorStatus, ServerMessage, SnapshotView, Stats, TicketStatus};
use clinic_queue_runtime::{Dispatched, Origin};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Outcome of a command endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the command changed anything
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
}

/// Server status.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `running`
    pub status: String,
    /// Live viewer connections
    pub clients: usize,
    /// Current dashboard statistics
    pub stats: Stats,
}

/// Request to take a ticket.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeTicketRequest {
    /// Patient name
    pub patient_name: String,
    /// Optional complaint
    #[serde(default)]
    pub complaint: Option<String>,
    /// Doctor to queue for
    pub doctor_id: DoctorId,
}

/// Request to call a ticket.
///
/// Either `{"next": true}` for the lowest waiting ticket or
/// `{"number": n}` for a specific one. `number` wins when both are set.
#[derive(Debug, Default, Deserialize)]
pub struct CallRequest {
    /// Call the lowest waiting ticket
    #[serde(default)]
    pub next: bool,
    /// Specific ticket number
    #[serde(default)]
    pub number: Option<u64>,
}

impl CallRequest {
    /// Resolve the command this request asks for.
    ///
    /// # Errors
    ///
    /// Returns a validation error when neither `next` nor `number` is set.
    pub fn into_command(self) -> Result<Command, AppError> {
        match (self.number, self.next) {
            (Some(number), _) => Ok(Command::CallSpecific { number }),
            (None, true) => Ok(Command::CallNext),
            (None, false) => Err(AppError::validation("Expected \"next\": true or a ticket \"number\"")),
        }
    }
}

/// Request to change a ticket's status.
#[derive(Debug, Deserialize)]
pub struct TicketStatusRequest {
    /// Target status
    pub status: TicketStatus,
}

/// Request to change a doctor's availability.
#[derive(Debug, Deserialize)]
pub struct DoctorStatusRequest {
    /// New availability
    pub status: DoctorStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /api/status`
///
/// # Errors
///
/// Returns 503 while shutting down.
pub async fn status(State(state): State<AppState>) -> WebResult<Json<StatusResponse>> {
    let outcome = state
        .dispatcher
        .send(
            Command::RequestSnapshot {
                view: SnapshotView::Dashboard,
            },
            Origin::External,
        )
        .await?;

    let stats = outcome
        .replies
        .into_iter()
        .find_map(|reply| match reply {
            ServerMessage::DashboardUpdate(stats) => Some(stats),
            _ => None,
        })
        .ok_or_else(|| AppError::internal("Dashboard snapshot missing"))?;

    Ok(Json(StatusResponse {
        status: "running".to_string(),
        clients: state.dispatcher.connection_count().await,
        stats,
    }))
}

/// `POST /api/tickets`
///
/// # Errors
///
/// Returns 422 for a blank name or unknown doctor.
pub async fn take_ticket(
    State(state): State<AppState>,
    Json(request): Json<TakeTicketRequest>,
) -> WebResult<Json<ApiResponse>> {
    let command = Command::TakeTicket {
        patient_name: request.patient_name,
        complaint: request.complaint.unwrap_or_default(),
        doctor_id: request.doctor_id,
    };
    dispatch(&state, command, "Ticket created").await
}

/// `POST /api/call`
///
/// # Errors
///
/// Returns 422 when the body names neither `next` nor `number`.
pub async fn call(
    State(state): State<AppState>,
    Json(request): Json<CallRequest>,
) -> WebResult<Json<ApiResponse>> {
    let command = request.into_command()?;
    dispatch(&state, command, "Ticket called").await
}

/// `PUT /api/tickets/:number/status`
///
/// # Errors
///
/// Returns 503 while shutting down.
pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(number): Path<u64>,
    Json(request): Json<TicketStatusRequest>,
) -> WebResult<Json<ApiResponse>> {
    let command = Command::UpdateTicketStatus {
        number,
        status: request.status,
    };
    dispatch(&state, command, "Ticket status updated").await
}

/// `PUT /api/doctors/:id/status`
///
/// # Errors
///
/// Returns 503 while shutting down.
pub async fn update_doctor_status(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<DoctorStatusRequest>,
) -> WebResult<Json<ApiResponse>> {
    let command = Command::UpdateDoctorStatus {
        doctor_id: DoctorId::new(id),
        status: request.status,
    };
    dispatch(&state, command, "Doctor status updated").await
}

/// Run a command for an external caller and acknowledge it.
///
/// An `ERROR` reply becomes a 422. Commands that found nothing to act on
/// are acknowledged like any other.
async fn dispatch(state: &AppState, command: Command, done: &str) -> WebResult<Json<ApiResponse>> {
    let kind = command.kind();
    let Dispatched { broadcasts, replies } = state.dispatcher.send(command, Origin::External).await?;

    if let Some(message) = replies.into_iter().find_map(|reply| match reply {
        ServerMessage::Error(body) => Some(body.message),
        _ => None,
    }) {
        return Err(AppError::validation(message));
    }

    if broadcasts == 0 {
        tracing::debug!(command = kind, "REST command changed nothing");
    }
    Ok(Json(ApiResponse {
        success: true,
        message: done.to_string(),
    }))
}
