//! The queue reducer: validates commands, mutates the store and describes
//! what every viewer must receive, in order.

use crate::protocol::{Command, InitialData, ServerMessage, SnapshotView};
use crate::stats::compute_statistics;
use crate::store::{QueueError, QueueStore, Trigger};
use crate::types::{DoctorId, DoctorStatus, TicketId, TicketStatus};
use chrono::{DateTime, Utc};
use clinic_queue_core::effect::Effect;
use clinic_queue_core::environment::{Clock, IdGenerator, RandomIds, SystemClock};
use clinic_queue_core::reducer::Reducer;
use clinic_queue_core::{Effects, SmallVec, smallvec};
use std::sync::Arc;

/// Injected dependencies of [`QueueReducer`]
#[derive(Clone)]
pub struct QueueEnvironment {
    /// Source of timestamps
    pub clock: Arc<dyn Clock>,
    /// Source of ticket ids
    pub ids: Arc<dyn IdGenerator>,
}

impl QueueEnvironment {
    /// Create an environment from explicit dependencies
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    /// System clock and random v4 ids
    #[must_use]
    pub fn production() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(RandomIds))
    }
}

impl std::fmt::Debug for QueueEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEnvironment").finish_non_exhaustive()
    }
}

/// Reducer for the clinic queue
///
/// Broadcast order per command:
///
/// | Command | Broadcasts |
/// |---|---|
/// | take ticket | `TICKET_CREATED`, `DASHBOARD_UPDATE` |
/// | call next / call specific | `DOCTOR_STATUS`, `TICKET_CALLED`, `STATUS_UPDATED`, `DASHBOARD_UPDATE` |
/// | update ticket status | (`DOCTOR_STATUS` when done), `STATUS_UPDATED`, `DASHBOARD_UPDATE` |
/// | update doctor status | `DOCTOR_STATUS` |
///
/// Snapshot requests and rejected input only produce private replies.
/// Unknown tickets or doctors, an empty queue and rejected transitions
/// produce nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueReducer;

impl QueueReducer {
    /// Creates a new `QueueReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Snapshot sent to a viewer when it connects
    #[must_use]
    pub fn initial_data(state: &QueueStore, now: DateTime<Utc>) -> InitialData {
        InitialData {
            tickets: state.find_active_tickets().into_iter().cloned().collect(),
            doctors: state.doctors().cloned().collect(),
            stats: compute_statistics(state, now),
        }
    }

    fn take_ticket(
        state: &mut QueueStore,
        patient_name: &str,
        complaint: &str,
        doctor_id: DoctorId,
        env: &QueueEnvironment,
    ) -> Effects<ServerMessage> {
        let now = env.clock.now();
        let id = TicketId::from_uuid(env.ids.next_id());

        match state.create_ticket(patient_name, complaint, doctor_id, id, now) {
            Ok(ticket) => {
                let ticket = ticket.clone();
                tracing::info!(
                    number = ticket.number,
                    doctor_id = %doctor_id,
                    "Ticket created"
                );
                smallvec![
                    Effect::Broadcast(ServerMessage::TicketCreated(ticket)),
                    Self::dashboard(state, now),
                ]
            },
            Err(error) => {
                tracing::warn!(%error, "Take ticket rejected");
                smallvec![Effect::Reply(ServerMessage::error(error.to_string()))]
            },
        }
    }

    fn call(state: &mut QueueStore, number: Option<u64>, env: &QueueEnvironment) -> Effects<ServerMessage> {
        let resolved = match number {
            None => state.call_next(),
            Some(number) => state.call_specific(number),
        };
        let (number, doctor_id) = match resolved {
            Ok(ticket) => (ticket.number, ticket.doctor_id),
            Err(error) => return Self::skipped(&error, "Call"),
        };

        let now = env.clock.now();
        let ticket = match state.transition(number, TicketStatus::Serving, Trigger::Call, now) {
            Ok(ticket) => ticket.clone(),
            Err(error) => return Self::skipped(&error, "Call"),
        };

        let mut effects = SmallVec::new();
        match state.set_doctor_status(doctor_id, DoctorStatus::Busy) {
            Ok(doctor) => effects.push(Effect::Broadcast(ServerMessage::DoctorStatus(doctor.clone()))),
            Err(error) => tracing::warn!(%error, number, "Called ticket has no doctor"),
        }
        tracing::info!(number, doctor_id = %doctor_id, room = %ticket.room, "Ticket called");
        effects.push(Effect::Broadcast(ServerMessage::TicketCalled(ticket.clone())));
        effects.push(Effect::Broadcast(ServerMessage::StatusUpdated(ticket)));
        effects.push(Self::dashboard(state, now));
        effects
    }

    fn update_ticket_status(
        state: &mut QueueStore,
        number: u64,
        status: TicketStatus,
        env: &QueueEnvironment,
    ) -> Effects<ServerMessage> {
        let doctor_id = match state.find_ticket_by_number(number) {
            Ok(ticket) => ticket.doctor_id,
            Err(error) => return Self::skipped(&error, "Status update"),
        };

        let now = env.clock.now();
        let ticket = match state.transition(number, status, Trigger::StatusUpdate, now) {
            Ok(ticket) => ticket.clone(),
            Err(error) => return Self::skipped(&error, "Status update"),
        };

        let mut effects = SmallVec::new();
        if status == TicketStatus::Done {
            match state.set_doctor_status(doctor_id, DoctorStatus::Available) {
                Ok(doctor) => effects.push(Effect::Broadcast(ServerMessage::DoctorStatus(doctor.clone()))),
                Err(error) => tracing::warn!(%error, number, "Completed ticket has no doctor"),
            }
        }
        tracing::info!(number, status = %status, "Ticket status updated");
        effects.push(Effect::Broadcast(ServerMessage::StatusUpdated(ticket)));
        effects.push(Self::dashboard(state, now));
        effects
    }

    fn update_doctor_status(
        state: &mut QueueStore,
        doctor_id: DoctorId,
        status: DoctorStatus,
    ) -> Effects<ServerMessage> {
        match state.set_doctor_status(doctor_id, status) {
            Ok(doctor) => {
                tracing::info!(doctor_id = %doctor_id, status = %status, "Doctor status overridden");
                smallvec![Effect::Broadcast(ServerMessage::DoctorStatus(doctor.clone()))]
            },
            Err(error) => Self::skipped(&error, "Doctor status update"),
        }
    }

    fn snapshot(state: &QueueStore, view: SnapshotView, env: &QueueEnvironment) -> Effects<ServerMessage> {
        let message = match view {
            SnapshotView::Dashboard => ServerMessage::DashboardUpdate(compute_statistics(state, env.clock.now())),
            SnapshotView::Tickets => {
                ServerMessage::TicketList(state.find_active_tickets().into_iter().cloned().collect())
            },
            SnapshotView::Doctors => ServerMessage::DoctorList(state.doctors().cloned().collect()),
        };
        smallvec![Effect::Reply(message)]
    }

    /// Log a command that ended without effects.
    ///
    /// Nothing to act on is routine; a refused transition is not.
    fn skipped(error: &QueueError, command: &str) -> Effects<ServerMessage> {
        if error.is_not_found() {
            tracing::debug!(%error, command, "Nothing to act on");
        } else {
            tracing::warn!(%error, command, "Command rejected");
        }
        SmallVec::new()
    }

    fn dashboard(state: &QueueStore, now: DateTime<Utc>) -> Effect<ServerMessage> {
        Effect::Broadcast(ServerMessage::DashboardUpdate(compute_statistics(state, now)))
    }
}

impl Reducer for QueueReducer {
    type State = QueueStore;
    type Action = Command;
    type Event = ServerMessage;
    type Environment = QueueEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Event> {
        tracing::debug!(command = action.kind(), "Reducing command");

        match action {
            Command::TakeTicket {
                patient_name,
                complaint,
                doctor_id,
            } => Self::take_ticket(state, &patient_name, &complaint, doctor_id, env),
            Command::CallNext => Self::call(state, None, env),
            Command::CallSpecific { number } => Self::call(state, Some(number), env),
            Command::UpdateTicketStatus { number, status } => {
                Self::update_ticket_status(state, number, status, env)
            },
            Command::UpdateDoctorStatus { doctor_id, status } => {
                Self::update_doctor_status(state, doctor_id, status)
            },
            Command::RequestSnapshot { view } => Self::snapshot(state, view, env),
        }
    }

    fn on_connect(&self, state: &Self::State, env: &Self::Environment) -> Option<Self::Event> {
        Some(ServerMessage::InitialData(Self::initial_data(state, env.clock.now())))
    }
}
