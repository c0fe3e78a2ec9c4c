//! Queue store: the only owner of tickets and doctors.
//!
//! The store is pure data plus transition logic. It never broadcasts and
//! never reads the clock; timestamps and ids are handed in by the caller.

use crate::types::{Doctor, DoctorId, DoctorStatus, Ticket, TicketId, TicketStatus, default_roster};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned by [`QueueStore`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Command fields are missing or unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No ticket carries this number
    #[error("Ticket {0} not found")]
    TicketNotFound(u64),

    /// No doctor carries this id
    #[error("Doctor {0} not found")]
    DoctorNotFound(DoctorId),

    /// No ticket is waiting
    #[error("No ticket is waiting")]
    EmptyQueue,

    /// The transition table rejects the status change
    #[error("Ticket {number} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Ticket number
        number: u64,
        /// Current status
        from: TicketStatus,
        /// Requested status
        to: TicketStatus,
    },
}

impl QueueError {
    /// Whether the error only means "nothing to act on"
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TicketNotFound(_) | Self::DoctorNotFound(_) | Self::EmptyQueue
        )
    }
}

/// What is asking for a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A call-next or call-specific command
    Call,
    /// An explicit status update command
    StatusUpdate,
}

type Rule = (TicketStatus, TicketStatus, Trigger);

const LENIENT_RULES: &[Rule] = &[
    (TicketStatus::Waiting, TicketStatus::Waiting, Trigger::StatusUpdate),
    (TicketStatus::Waiting, TicketStatus::Serving, Trigger::Call),
    (TicketStatus::Waiting, TicketStatus::Done, Trigger::StatusUpdate),
    (TicketStatus::Serving, TicketStatus::Serving, Trigger::Call),
    (TicketStatus::Serving, TicketStatus::Serving, Trigger::StatusUpdate),
    (TicketStatus::Serving, TicketStatus::Done, Trigger::StatusUpdate),
    (TicketStatus::Done, TicketStatus::Done, Trigger::StatusUpdate),
];

const STRICT_RULES: &[Rule] = &[
    (TicketStatus::Waiting, TicketStatus::Serving, Trigger::Call),
    (TicketStatus::Serving, TicketStatus::Done, Trigger::StatusUpdate),
];

/// Which ticket status changes the store accepts
///
/// `Lenient` lets a status update skip `SERVING` or repeat the current
/// status, and lets a ticket being served be called again. `Strict` only
/// allows the two forward steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Forward moves and same-status updates
    #[default]
    Lenient,
    /// Call into `SERVING`, then update to `DONE`, nothing else
    Strict,
}

impl TransitionPolicy {
    const fn rules(self) -> &'static [Rule] {
        match self {
            Self::Lenient => LENIENT_RULES,
            Self::Strict => STRICT_RULES,
        }
    }

    /// Whether `from → to` is allowed for this trigger
    #[must_use]
    pub fn allows(self, from: TicketStatus, to: TicketStatus, trigger: Trigger) -> bool {
        self.rules().contains(&(from, to, trigger))
    }
}

/// Error for an unrecognised policy name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown transition policy '{0}' (expected 'lenient' or 'strict')")]
pub struct UnknownPolicy(pub String);

impl std::str::FromStr for TransitionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Tickets in creation order and doctors keyed by id
#[derive(Debug, Clone)]
pub struct QueueStore {
    tickets: Vec<Ticket>,
    doctors: BTreeMap<DoctorId, Doctor>,
    last_number: u64,
    policy: TransitionPolicy,
}

impl QueueStore {
    /// Create an empty queue served by the given doctors
    pub fn new(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            tickets: Vec::new(),
            doctors: doctors.into_iter().map(|d| (d.id, d)).collect(),
            last_number: 0,
            policy: TransitionPolicy::default(),
        }
    }

    /// Create an empty queue served by the default roster
    #[must_use]
    pub fn with_default_roster() -> Self {
        Self::new(default_roster())
    }

    /// Use a different transition policy
    #[must_use]
    pub const fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active transition policy
    #[must_use]
    pub const fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Take a ticket for a doctor.
    ///
    /// The patient name is trimmed; a blank name or an unknown doctor is
    /// rejected and consumes no number.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] for a blank name or unknown doctor.
    pub fn create_ticket(
        &mut self,
        patient_name: &str,
        complaint: &str,
        doctor_id: DoctorId,
        id: TicketId,
        registered_at: DateTime<Utc>,
    ) -> Result<&Ticket, QueueError> {
        let patient_name = patient_name.trim();
        if patient_name.is_empty() {
            return Err(QueueError::InvalidInput("patientName must not be empty".to_string()));
        }
        let doctor = self
            .doctors
            .get(&doctor_id)
            .ok_or_else(|| QueueError::InvalidInput(format!("unknown doctor {doctor_id}")))?;

        let ticket = Ticket {
            id,
            number: self.last_number + 1,
            patient_name: patient_name.to_string(),
            complaint: complaint.trim().to_string(),
            doctor_id,
            doctor_name: doctor.name.clone(),
            room: doctor.room.clone(),
            status: TicketStatus::Waiting,
            registered_at,
            called_at: None,
            completed_at: None,
        };
        self.last_number = ticket.number;
        self.tickets.push(ticket);

        Ok(&self.tickets[self.tickets.len() - 1])
    }

    /// Tickets that are not `DONE`, by ascending number
    #[must_use]
    pub fn find_active_tickets(&self) -> Vec<&Ticket> {
        self.tickets.iter().filter(|t| t.status.is_active()).collect()
    }

    /// Look up a ticket by its number
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TicketNotFound`] if no ticket has this number.
    pub fn find_ticket_by_number(&self, number: u64) -> Result<&Ticket, QueueError> {
        self.index_of(number).map(|i| &self.tickets[i])
    }

    /// The `WAITING` ticket with the smallest number. Does not change it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EmptyQueue`] when nobody is waiting.
    pub fn call_next(&self) -> Result<&Ticket, QueueError> {
        self.tickets
            .iter()
            .find(|t| t.status == TicketStatus::Waiting)
            .ok_or(QueueError::EmptyQueue)
    }

    /// The ticket with this number, whatever its status. Does not change it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TicketNotFound`] if no ticket has this number.
    pub fn call_specific(&self, number: u64) -> Result<&Ticket, QueueError> {
        self.find_ticket_by_number(number)
    }

    /// Move a ticket to a new status.
    ///
    /// `calledAt` is stamped on the first move into `SERVING` and
    /// `completedAt` on the first move into `DONE`; neither is overwritten.
    /// Doctor availability is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TicketNotFound`] for an unknown number and
    /// [`QueueError::InvalidTransition`] when the policy rejects the move.
    pub fn transition(
        &mut self,
        number: u64,
        to: TicketStatus,
        trigger: Trigger,
        at: DateTime<Utc>,
    ) -> Result<&Ticket, QueueError> {
        let policy = self.policy;
        let index = self.index_of(number)?;
        let ticket = &mut self.tickets[index];

        if !policy.allows(ticket.status, to, trigger) {
            return Err(QueueError::InvalidTransition {
                number,
                from: ticket.status,
                to,
            });
        }

        ticket.status = to;
        match to {
            TicketStatus::Serving => {
                ticket.called_at.get_or_insert(at);
            },
            TicketStatus::Done => {
                ticket.completed_at.get_or_insert(at);
            },
            TicketStatus::Waiting => {},
        }

        Ok(&*ticket)
    }

    /// Set a doctor's availability
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::DoctorNotFound`] for an unknown id.
    pub fn set_doctor_status(
        &mut self,
        id: DoctorId,
        status: DoctorStatus,
    ) -> Result<&Doctor, QueueError> {
        let doctor = self.doctors.get_mut(&id).ok_or(QueueError::DoctorNotFound(id))?;
        doctor.status = status;
        Ok(&*doctor)
    }

    /// Look up a doctor by id
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::DoctorNotFound`] for an unknown id.
    pub fn find_doctor(&self, id: DoctorId) -> Result<&Doctor, QueueError> {
        self.doctors.get(&id).ok_or(QueueError::DoctorNotFound(id))
    }

    /// All doctors by ascending id
    pub fn doctors(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.values()
    }

    /// Every ticket ever taken, by ascending number
    #[must_use]
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    fn index_of(&self, number: u64) -> Result<usize, QueueError> {
        self.tickets
            .binary_search_by_key(&number, |t| t.number)
            .map_err(|_| QueueError::TicketNotFound(number))
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::with_default_roster()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn take(store: &mut QueueStore, name: &str, doctor: u32) -> u64 {
        let id = TicketId::from_uuid(Uuid::new_v4());
        store
            .create_ticket(name, "", DoctorId::new(doctor), id, at())
            .unwrap()
            .number
    }

    #[test]
    fn create_ticket_copies_doctor_details() {
        let mut store = QueueStore::with_default_roster();
        let ticket = store
            .create_ticket("  Budi ", "Demam", DoctorId::new(1), TicketId::from_uuid(Uuid::nil()), at())
            .unwrap();

        assert_eq!(ticket.number, 1);
        assert_eq!(ticket.patient_name, "Budi");
        assert_eq!(ticket.doctor_name, "Dr. Andi");
        assert_eq!(ticket.room, "Ruang 101");
        assert_eq!(ticket.status, TicketStatus::Waiting);
        assert_eq!(ticket.registered_at, at());
        assert!(ticket.called_at.is_none());
    }

    #[test]
    fn invalid_ticket_consumes_no_number() {
        let mut store = QueueStore::with_default_roster();
        let id = TicketId::from_uuid(Uuid::nil());

        let blank = store.create_ticket("   ", "", DoctorId::new(1), id, at());
        assert!(matches!(blank, Err(QueueError::InvalidInput(_))));
        let unknown = store.create_ticket("Budi", "", DoctorId::new(9), id, at());
        assert!(matches!(unknown, Err(QueueError::InvalidInput(_))));

        assert_eq!(take(&mut store, "Budi", 1), 1);
    }

    #[test]
    fn call_next_on_empty_queue() {
        let store = QueueStore::with_default_roster();
        assert_eq!(store.call_next().unwrap_err(), QueueError::EmptyQueue);
    }

    #[test]
    fn call_next_skips_called_tickets() {
        let mut store = QueueStore::with_default_roster();
        take(&mut store, "A", 1);
        take(&mut store, "B", 2);
        store.transition(1, TicketStatus::Serving, Trigger::Call, at()).unwrap();

        assert_eq!(store.call_next().unwrap().number, 2);
    }

    #[test]
    fn done_tickets_leave_the_active_view() {
        let mut store = QueueStore::with_default_roster();
        take(&mut store, "A", 1);
        take(&mut store, "B", 1);
        store.transition(1, TicketStatus::Done, Trigger::StatusUpdate, at()).unwrap();

        let active: Vec<u64> = store.find_active_tickets().iter().map(|t| t.number).collect();
        assert_eq!(active, vec![2]);
        assert_eq!(store.tickets().len(), 2);
    }

    #[test]
    fn lenient_policy_table() {
        use TicketStatus::{Done, Serving, Waiting};
        let policy = TransitionPolicy::Lenient;

        assert!(policy.allows(Waiting, Serving, Trigger::Call));
        assert!(!policy.allows(Waiting, Serving, Trigger::StatusUpdate));
        assert!(policy.allows(Waiting, Done, Trigger::StatusUpdate));
        assert!(policy.allows(Serving, Done, Trigger::StatusUpdate));
        assert!(policy.allows(Done, Done, Trigger::StatusUpdate));
        assert!(!policy.allows(Serving, Waiting, Trigger::StatusUpdate));
        assert!(!policy.allows(Done, Waiting, Trigger::StatusUpdate));
        assert!(policy.allows(Serving, Serving, Trigger::Call));
        assert!(!policy.allows(Done, Serving, Trigger::Call));
        assert!(!TransitionPolicy::Strict.allows(Serving, Serving, Trigger::Call));
    }

    #[test]
    fn strict_policy_rejects_skipping_serving() {
        let mut store = QueueStore::with_default_roster().with_policy(TransitionPolicy::Strict);
        take(&mut store, "A", 1);

        let err = store
            .transition(1, TicketStatus::Done, Trigger::StatusUpdate, at())
            .unwrap_err();
        assert_eq!(
            err,
            QueueError::InvalidTransition {
                number: 1,
                from: TicketStatus::Waiting,
                to: TicketStatus::Done,
            }
        );
        assert_eq!(store.find_ticket_by_number(1).unwrap().status, TicketStatus::Waiting);
    }

    #[test]
    fn timestamps_are_set_once() {
        let mut store = QueueStore::with_default_roster();
        take(&mut store, "A", 1);
        let later = at() + chrono::Duration::minutes(10);

        store.transition(1, TicketStatus::Serving, Trigger::Call, at()).unwrap();
        store.transition(1, TicketStatus::Serving, Trigger::StatusUpdate, later).unwrap();
        store.transition(1, TicketStatus::Done, Trigger::StatusUpdate, later).unwrap();
        let ticket = store
            .transition(1, TicketStatus::Done, Trigger::StatusUpdate, later + chrono::Duration::minutes(1))
            .unwrap();

        assert_eq!(ticket.called_at, Some(at()));
        assert_eq!(ticket.completed_at, Some(later));
    }

    #[test]
    fn unknown_ticket_and_doctor() {
        let mut store = QueueStore::with_default_roster();
        assert_eq!(store.find_ticket_by_number(4).unwrap_err(), QueueError::TicketNotFound(4));
        assert!(store.call_specific(4).unwrap_err().is_not_found());
        assert_eq!(
            store.set_doctor_status(DoctorId::new(7), DoctorStatus::Busy).unwrap_err(),
            QueueError::DoctorNotFound(DoctorId::new(7))
        );
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("Strict".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Strict);
        assert_eq!(" lenient ".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Lenient);
        assert!("loose".parse::<TransitionPolicy>().is_err());
    }

    proptest! {
        #[test]
        fn numbers_strictly_increase(names in proptest::collection::vec("[a-z ]{0,8}", 1..40)) {
            let mut store = QueueStore::with_default_roster();
            let mut last = 0;
            for (i, name) in names.iter().enumerate() {
                let doctor = DoctorId::new(u32::try_from(i % 3 + 1).unwrap());
                let id = TicketId::from_uuid(Uuid::from_u128(i as u128));
                if let Ok(ticket) = store.create_ticket(name, "", doctor, id, at()) {
                    prop_assert_eq!(ticket.number, last + 1);
                    last = ticket.number;
                }
            }
            let numbers: Vec<u64> = store.tickets().iter().map(|t| t.number).collect();
            prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn call_next_picks_smallest_waiting(
            count in 1usize..30,
            served in proptest::collection::vec(any::<bool>(), 30),
        ) {
            let mut store = QueueStore::with_default_roster();
            for _ in 0..count {
                take(&mut store, "P", 1);
            }
            for (number, serve) in (1..=count as u64).zip(served.iter()) {
                if *serve {
                    store.transition(number, TicketStatus::Serving, Trigger::Call, at()).unwrap();
                }
            }

            let expected = store
                .tickets()
                .iter()
                .filter(|t| t.status == TicketStatus::Waiting)
                .map(|t| t.number)
                .min();
            prop_assert_eq!(store.call_next().ok().map(|t| t.number), expected);
        }
    }
}
