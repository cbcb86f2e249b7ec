//! Port for appointment storage and schedule queries.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::{Page, PageRequest};
use uuid::Uuid;

use crate::domain::{Appointment, AppointmentFilter, UserId};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Store a new appointment.
    async fn insert(&self, appointment: &Appointment) -> Result<(), PersistenceError>;

    /// Fetch by identifier.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, PersistenceError>;

    /// Whether `doctor_id` has a schedule-blocking appointment overlapping
    /// the half-open interval `[start, end)`, ignoring `exclude`.
    async fn has_conflict(
        &self,
        doctor_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool, PersistenceError>;

    /// Page through a participant's appointments, latest date first.
    async fn list(
        &self,
        filter: AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, PersistenceError>;

    /// Non-cancelled appointments of a doctor within an optional window,
    /// earliest first.
    async fn doctor_schedule(
        &self,
        doctor_id: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, PersistenceError>;

    /// Persist mutable fields of an existing appointment.
    async fn update(&self, appointment: &Appointment) -> Result<(), PersistenceError>;
}
