//! Appointment booking, listing and lifecycle changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::info;
use uuid::Uuid;

use super::appointment::{
    CANCELLATION_REASON_MAX, CANCELLATION_REASON_MIN, DURATION_DEFAULT, DURATION_MAX,
    DURATION_MIN, REASON_MAX, REASON_MIN,
};
use super::ports::{AppointmentRepository, UserRepository};
use super::{
    Actor, Appointment, AppointmentFilter, AppointmentParticipant, AppointmentStatus, Error, Role,
    UserId, slot_end,
};

/// Booking request from a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    /// Requested doctor.
    pub doctor_id: UserId,
    /// Start of the slot; must lie in the future.
    pub appointment_date: DateTime<Utc>,
    /// Slot length; [`DURATION_DEFAULT`] when absent.
    pub duration_minutes: Option<u32>,
    /// Why the patient is booking.
    pub reason: String,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Partial update of an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentChanges {
    /// New start of the slot.
    pub appointment_date: Option<DateTime<Utc>>,
    /// New slot length.
    pub duration_minutes: Option<u32>,
    /// New status.
    pub status: Option<AppointmentStatus>,
    /// Replacement notes.
    pub notes: Option<String>,
}

/// Optional bounds on a schedule query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// Earliest start included.
    pub from: Option<DateTime<Utc>>,
    /// Latest start included.
    pub to: Option<DateTime<Utc>>,
}

/// Appointment service.
#[derive(Clone)]
pub struct AppointmentService {
    appointments: Arc<dyn AppointmentRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

fn check_text(field: &str, value: &str, min: usize, max: usize) -> Result<(), Error> {
    let length = value.trim().chars().count();
    if (min..=max).contains(&length) {
        Ok(())
    } else {
        Err(Error::invalid_request(format!(
            "{field} must be between {min} and {max} characters"
        )))
    }
}

fn check_duration(minutes: u32) -> Result<(), Error> {
    if (DURATION_MIN..=DURATION_MAX).contains(&minutes) {
        Ok(())
    } else {
        Err(Error::invalid_request(format!(
            "durationMinutes must be between {DURATION_MIN} and {DURATION_MAX}"
        )))
    }
}

fn slot_taken() -> Error {
    Error::conflict("doctor already has an appointment in this time slot")
}

impl AppointmentService {
    /// Create the service.
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            appointments,
            users,
            clock,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Appointment, Error> {
        self.appointments
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("appointment not found"))
    }

    fn check_future(&self, start: DateTime<Utc>) -> Result<(), Error> {
        if start <= self.clock.utc() {
            return Err(Error::invalid_request(
                "appointmentDate must be in the future",
            ));
        }
        Ok(())
    }

    /// Book a slot for the caller with an active doctor.
    pub async fn create(&self, actor: &Actor, request: NewAppointment) -> Result<Appointment, Error> {
        let duration = request.duration_minutes.unwrap_or(DURATION_DEFAULT);
        check_duration(duration)?;
        check_text("reason", &request.reason, REASON_MIN, REASON_MAX)?;
        self.check_future(request.appointment_date)?;
        let doctor = self
            .users
            .find_by_id(&request.doctor_id)
            .await?
            .filter(|user| user.role == Role::Doctor && user.is_active)
            .ok_or_else(|| Error::invalid_request("doctor not found or inactive"))?;

        let end = slot_end(request.appointment_date, duration);
        if self
            .appointments
            .has_conflict(&doctor.id, request.appointment_date, end, None)
            .await?
        {
            return Err(slot_taken());
        }

        let now = self.clock.utc();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: actor.user_id,
            doctor_id: doctor.id,
            appointment_date: request.appointment_date,
            duration_minutes: duration,
            status: AppointmentStatus::Scheduled,
            reason: request.reason.trim().to_owned(),
            notes: request.notes,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.appointments.insert(&appointment).await?;
        info!(appointment_id = %appointment.id, patient_id = %actor.user_id, doctor_id = %doctor.id, "appointment booked");
        Ok(appointment)
    }

    /// Appointments the caller attends (doctors) or booked (everyone else).
    pub async fn my_appointments(
        &self,
        actor: &Actor,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> Result<Page<Appointment>, Error> {
        let participant = if actor.role == Role::Doctor {
            AppointmentParticipant::Doctor(actor.user_id)
        } else {
            AppointmentParticipant::Patient(actor.user_id)
        };
        let filter = AppointmentFilter {
            participant,
            status,
        };
        Ok(self.appointments.list(filter, page).await?)
    }

    /// A doctor's non-cancelled appointments, earliest first.
    pub async fn doctor_schedule(
        &self,
        doctor_id: &UserId,
        window: ScheduleWindow,
    ) -> Result<Vec<Appointment>, Error> {
        Ok(self
            .appointments
            .doctor_schedule(doctor_id, window.from, window.to)
            .await?)
    }

    /// One appointment, visible to its participants and admins.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Appointment, Error> {
        let appointment = self.load(id).await?;
        if !actor.is_admin() && !appointment.involves(&actor.user_id) {
            return Err(Error::forbidden("not authorised to view this appointment"));
        }
        Ok(appointment)
    }

    /// Reschedule, change status or notes.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Appointment, Error> {
        let mut appointment = self.load(id).await?;
        if !appointment.involves(&actor.user_id) {
            return Err(Error::forbidden("not authorised to modify this appointment"));
        }
        if appointment.status.is_final() {
            return Err(Error::invalid_request(format!(
                "cannot modify a {} appointment",
                appointment.status
            )));
        }

        let rescheduled =
            changes.appointment_date.is_some() || changes.duration_minutes.is_some();
        if let Some(start) = changes.appointment_date {
            self.check_future(start)?;
            appointment.appointment_date = start;
        }
        if let Some(duration) = changes.duration_minutes {
            check_duration(duration)?;
            appointment.duration_minutes = duration;
        }
        if let Some(status) = changes.status {
            appointment.status = status;
        }
        if changes.notes.is_some() {
            appointment.notes = changes.notes;
        }

        if rescheduled
            && appointment.status.blocks_schedule()
            && self
                .appointments
                .has_conflict(
                    &appointment.doctor_id,
                    appointment.appointment_date,
                    appointment.ends_at(),
                    Some(appointment.id),
                )
                .await?
        {
            return Err(slot_taken());
        }

        appointment.updated_at = self.clock.utc();
        self.appointments.update(&appointment).await?;
        info!(appointment_id = %appointment.id, status = %appointment.status, "appointment updated");
        Ok(appointment)
    }

    /// Cancel with a reason.
    pub async fn cancel(&self, actor: &Actor, id: Uuid, reason: &str) -> Result<Appointment, Error> {
        check_text(
            "cancellationReason",
            reason,
            CANCELLATION_REASON_MIN,
            CANCELLATION_REASON_MAX,
        )?;
        let mut appointment = self.load(id).await?;
        if !appointment.involves(&actor.user_id) {
            return Err(Error::forbidden("not authorised to cancel this appointment"));
        }
        if appointment.status.is_final() {
            return Err(Error::invalid_request(format!(
                "appointment is already {}",
                appointment.status
            )));
        }
        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = Some(reason.trim().to_owned());
        appointment.updated_at = self.clock.utc();
        self.appointments.update(&appointment).await?;
        info!(appointment_id = %appointment.id, "appointment cancelled");
        Ok(appointment)
    }
}

#[cfg(test)]
#[path = "appointment_service_tests.rs"]
mod tests;
