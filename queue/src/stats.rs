//! Same-day dashboard statistics.

use crate::store::QueueStore;
use crate::types::{DoctorStatus, TicketStatus};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Dashboard counters, recomputed from the store on every call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Today's tickets still waiting
    #[serde(rename = "totalMenunggu")]
    pub waiting: usize,
    /// Today's tickets being served
    #[serde(rename = "totalDilayani")]
    pub serving: usize,
    /// Today's tickets done
    #[serde(rename = "totalSelesai")]
    pub done: usize,
    /// Every ticket registered today
    #[serde(rename = "totalHariIni")]
    pub total_today: usize,
    /// Doctors currently available
    #[serde(rename = "dokterAvailable")]
    pub doctors_available: usize,
    /// Doctors currently busy
    #[serde(rename = "dokterBusy")]
    pub doctors_busy: usize,
}

/// Statistics for the server's local calendar day containing `now`
#[must_use]
pub fn compute_statistics(store: &QueueStore, now: DateTime<Utc>) -> Stats {
    compute_statistics_in(store, now, &Local)
}

/// Statistics for the calendar day containing `now` in time zone `tz`
///
/// Tickets count when their registration date, seen in `tz`, equals the
/// date of `now`. Doctor counts ignore the date.
#[must_use]
pub fn compute_statistics_in<Tz: TimeZone>(store: &QueueStore, now: DateTime<Utc>, tz: &Tz) -> Stats {
    let today = now.with_timezone(tz).date_naive();
    let mut stats = Stats::default();

    for ticket in store
        .tickets()
        .iter()
        .filter(|t| t.registered_at.with_timezone(tz).date_naive() == today)
    {
        stats.total_today += 1;
        match ticket.status {
            TicketStatus::Waiting => stats.waiting += 1,
            TicketStatus::Serving => stats.serving += 1,
            TicketStatus::Done => stats.done += 1,
        }
    }

    for doctor in store.doctors() {
        match doctor.status {
            DoctorStatus::Available => stats.doctors_available += 1,
            DoctorStatus::Busy => stats.doctors_busy += 1,
        }
    }

    stats
}
