//! Appointment scheduling model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Shortest bookable appointment.
pub const DURATION_MIN: u32 = 15;
/// Longest bookable appointment.
pub const DURATION_MAX: u32 = 240;
/// Duration used when the patient does not pick one.
pub const DURATION_DEFAULT: u32 = 30;
/// Minimum reason length.
pub const REASON_MIN: usize = 10;
/// Maximum reason length.
pub const REASON_MAX: usize = 1000;
/// Minimum cancellation reason length.
pub const CANCELLATION_REASON_MIN: usize = 10;
/// Maximum cancellation reason length.
pub const CANCELLATION_REASON_MAX: usize = 500;

/// Lifecycle of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked by the patient.
    Scheduled,
    /// Confirmed by the clinic.
    Confirmed,
    /// Cancelled by either party.
    Cancelled,
    /// Took place.
    Completed,
    /// Patient did not attend.
    NoShow,
    /// Moved to a new slot.
    Rescheduled,
}

impl AppointmentStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
            Self::Rescheduled => "rescheduled",
        }
    }

    /// Whether the slot still blocks the doctor's calendar.
    pub const fn blocks_schedule(self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }

    /// Whether the appointment can no longer change.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown appointment status: {0}")]
pub struct UnknownAppointmentStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownAppointmentStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(Self::Scheduled),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            "no_show" => Ok(Self::NoShow),
            "rescheduled" => Ok(Self::Rescheduled),
            other => Err(UnknownAppointmentStatus(other.to_owned())),
        }
    }
}

/// Booked consultation between a patient and a doctor.
///
/// ## Invariants
/// - `duration_minutes` lies in `DURATION_MIN..=DURATION_MAX`.
/// - Two `scheduled`/`confirmed` appointments of one doctor never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    /// Identifier.
    pub id: Uuid,
    /// Booking patient.
    pub patient_id: UserId,
    /// Attending doctor.
    pub doctor_id: UserId,
    /// Start of the slot.
    pub appointment_date: DateTime<Utc>,
    /// Slot length.
    pub duration_minutes: u32,
    /// Current status.
    pub status: AppointmentStatus,
    /// Reason given by the patient.
    pub reason: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Reason recorded on cancellation.
    pub cancellation_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// End of the slot (exclusive).
    pub fn ends_at(&self) -> DateTime<Utc> {
        slot_end(self.appointment_date, self.duration_minutes)
    }

    /// Whether `user` is the patient or the doctor.
    pub fn involves(&self, user: &UserId) -> bool {
        self.patient_id == *user || self.doctor_id == *user
    }
}

/// End of a slot starting at `start` lasting `duration_minutes`.
pub fn slot_end(start: DateTime<Utc>, duration_minutes: u32) -> DateTime<Utc> {
    start + TimeDelta::minutes(i64::from(duration_minutes))
}

/// Half-open interval overlap test used for conflict detection.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use medisecure::domain::intervals_overlap;
///
/// let at = |h| Utc.with_ymd_and_hms(2030, 1, 1, h, 0, 0).unwrap();
/// assert!(intervals_overlap((at(9), at(10)), (at(9), at(11))));
/// assert!(!intervals_overlap((at(9), at(10)), (at(10), at(11))));
/// ```
pub fn intervals_overlap(
    a: (DateTime<Utc>, DateTime<Utc>),
    b: (DateTime<Utc>, DateTime<Utc>),
) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Which side of the appointment the listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentParticipant {
    /// Appointments booked by this patient.
    Patient(UserId),
    /// Appointments attended by this doctor.
    Doctor(UserId),
}

/// Filter for participant listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentFilter {
    /// Whose appointments to list.
    pub participant: AppointmentParticipant,
    /// Optional status restriction.
    pub status: Option<AppointmentStatus>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2031, 3, 4, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    #[case((at(9, 0), at(9, 30)), (at(9, 15), at(9, 45)), true)]
    #[case((at(9, 0), at(9, 30)), (at(9, 30), at(10, 0)), false)]
    #[case((at(9, 0), at(12, 0)), (at(10, 0), at(10, 15)), true)]
    #[case((at(10, 0), at(10, 15)), (at(9, 0), at(9, 59)), false)]
    fn overlap_is_half_open(
        #[case] a: (DateTime<Utc>, DateTime<Utc>),
        #[case] b: (DateTime<Utc>, DateTime<Utc>),
        #[case] expected: bool,
    ) {
        assert_eq!(intervals_overlap(a, b), expected);
        assert_eq!(intervals_overlap(b, a), expected);
    }

    #[rstest]
    #[case("scheduled", AppointmentStatus::Scheduled)]
    #[case("no_show", AppointmentStatus::NoShow)]
    #[case("rescheduled", AppointmentStatus::Rescheduled)]
    fn status_round_trips_through_storage_names(
        #[case] raw: &str,
        #[case] status: AppointmentStatus,
    ) {
        assert_eq!(raw.parse::<AppointmentStatus>(), Ok(status));
        assert_eq!(status.as_str(), raw);
    }

    #[rstest]
    fn only_live_statuses_block_the_schedule() {
        assert!(AppointmentStatus::Scheduled.blocks_schedule());
        assert!(AppointmentStatus::Confirmed.blocks_schedule());
        assert!(!AppointmentStatus::Rescheduled.blocks_schedule());
        assert!(!AppointmentStatus::Cancelled.blocks_schedule());
    }

    #[rstest]
    fn slot_end_adds_duration() {
        assert_eq!(slot_end(at(9, 0), 45), at(9, 45));
    }
}
