//! Consultant scheduling engine: availability modelling, bookable-slot
//! generation, conflict resolution and recurring-appointment expansion.
//!
//! Everything in this module is synchronous and side-effect free; callers
//! fetch the inputs (profile, booked appointments) and persist the outputs.
//! Conflict detection here is advisory — it works on a snapshot of the
//! appointment table, and the write path re-checks inside a transaction.

pub mod availability;
pub mod clock;
pub mod conflict;
pub mod recurrence;
pub mod slots;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use thiserror::Error;

pub use availability::{AvailabilityException, AvailabilityProfile, DaySchedule, WeeklySchedule};
pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::resolve_conflicts;
pub use recurrence::{expand, AppointmentInstance, AppointmentTemplate};
pub use slots::{generate_slots, TimeSlot};

/// Malformed profile, pattern or parameter. Raised synchronously at
/// construction or operation entry; the engine never partially applies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }
}

/// Whether `date` falls inside the profile's max-advance booking window.
/// "Today" is evaluated in the consultant's timezone.
pub fn date_within_booking_window(
    profile: &AvailabilityProfile,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> bool {
    let today = now.with_timezone(&profile.timezone).date_naive();
    match today.checked_add_days(Days::new(u64::from(profile.max_advance_days))) {
        Some(latest) => date <= latest,
        None => true,
    }
}

/// Earliest instant a new booking may start, per the profile's min-notice
/// policy.
pub fn min_notice_cutoff(profile: &AvailabilityProfile, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(i64::from(profile.min_notice_hours))
}

/// Drop generated slots that start before the min-notice cutoff. Applied
/// after conflict resolution so buffer propagation sees the full slot array.
pub fn apply_min_notice(slots: &mut Vec<TimeSlot>, cutoff: DateTime<Utc>) {
    slots.retain(|slot| slot.start >= cutoff);
}
