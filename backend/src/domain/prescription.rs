//! Prescriptions and their medication lines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Minimum diagnosis length.
pub const DIAGNOSIS_MIN: usize = 10;
/// Maximum diagnosis length.
pub const DIAGNOSIS_MAX: usize = 2000;
/// Days a prescription stays valid after issue.
pub const VALIDITY_DAYS: i64 = 365;
/// Maximum refills a doctor may allow on a single medication.
pub const REFILLS_MAX: u32 = 12;
/// Maximum treatment length per medication.
pub const DURATION_DAYS_MAX: u32 = 365;

/// Lifecycle of a prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    /// Can be refilled.
    Active,
    /// Course finished.
    Completed,
    /// Withdrawn by the prescribing doctor.
    Cancelled,
    /// Past its expiry date.
    Expired,
}

impl PrescriptionStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown prescription status: {0}")]
pub struct UnknownPrescriptionStatus(pub String);

impl FromStr for PrescriptionStatus {
    type Err = UnknownPrescriptionStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownPrescriptionStatus(other.to_owned())),
        }
    }
}

/// One medication line on a prescription.
///
/// ## Invariants
/// - `refills_remaining <= refills_allowed`, and it only ever decreases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Medication {
    /// Identifier.
    pub id: Uuid,
    /// Owning prescription.
    pub prescription_id: Uuid,
    /// Drug name.
    pub medication_name: String,
    /// Dose per administration.
    pub dosage: String,
    /// Administration schedule.
    pub frequency: String,
    /// Treatment length.
    pub duration_days: u32,
    /// Units dispensed.
    pub quantity: u32,
    /// Refills granted at issue.
    pub refills_allowed: u32,
    /// Refills left.
    pub refills_remaining: u32,
    /// Extra guidance for the patient.
    pub instructions: Option<String>,
}

/// Prescription written by a doctor for a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescription {
    /// Identifier.
    pub id: Uuid,
    /// Human-readable number `RX-YYYYmmddHHMMSS-XXXXXXXX`.
    pub prescription_number: String,
    /// Patient the prescription is for.
    pub patient_id: UserId,
    /// Prescribing doctor.
    pub doctor_id: UserId,
    /// Originating appointment, if any.
    pub appointment_id: Option<Uuid>,
    /// Diagnosis text.
    pub diagnosis: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Current status.
    pub status: PrescriptionStatus,
    /// Issue timestamp.
    pub issued_date: DateTime<Utc>,
    /// Expiry timestamp.
    pub expiry_date: DateTime<Utc>,
    /// Medication lines.
    pub medications: Vec<Medication>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    /// Whether refills may be dispensed at `now`.
    pub fn is_refillable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PrescriptionStatus::Active && self.expiry_date > now
    }

    /// Find a medication line by id.
    pub fn medication(&self, medication_id: Uuid) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == medication_id)
    }
}

/// Expiry for a prescription issued at `issued`.
pub fn expiry_for(issued: DateTime<Utc>) -> DateTime<Utc> {
    issued + TimeDelta::days(VALIDITY_DAYS)
}

/// Build a prescription number from the issue time and an 8-hex-digit suffix.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use medisecure::domain::prescription_number;
///
/// let issued = Utc.with_ymd_and_hms(2031, 5, 6, 7, 8, 9).unwrap();
/// assert_eq!(
///     prescription_number(issued, 0x00ab_cdef),
///     "RX-20310506070809-00ABCDEF"
/// );
/// ```
pub fn prescription_number(issued: DateTime<Utc>, suffix: u32) -> String {
    format!("RX-{}-{suffix:08X}", issued.format("%Y%m%d%H%M%S"))
}

/// Whose prescriptions to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrescriptionOwner {
    /// Prescriptions issued to this patient.
    Patient(UserId),
    /// Prescriptions written by this doctor.
    Doctor(UserId),
}
