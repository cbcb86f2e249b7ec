//! PostgreSQL-backed `AppointmentRepository` implementation using Diesel ORM.
//!
//! Overlap detection narrows candidates in SQL using the longest allowed
//! duration, then applies the exact half-open interval test in Rust so the
//! rule stays defined in one place.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pagination::{Page, PageRequest};
use uuid::Uuid;

use crate::domain::appointment::DURATION_MAX;
use crate::domain::ports::{AppointmentRepository, PersistenceError};
use crate::domain::{
    Appointment, AppointmentFilter, AppointmentParticipant, AppointmentStatus, UserId,
    intervals_overlap,
};

use super::diesel_helpers::{
    collect_rows, map_diesel_error, map_pool_error, parse_column, to_count, to_i32, to_u32,
};
use super::models::{AppointmentRow, AppointmentUpdate};
use super::pool::DbPool;
use super::schema::appointments;

const BLOCKING_STATUSES: [&str; 2] = [
    AppointmentStatus::Scheduled.as_str(),
    AppointmentStatus::Confirmed.as_str(),
];

/// Diesel-backed implementation of the `AppointmentRepository` port.
#[derive(Clone)]
pub struct DieselAppointmentRepository {
    pool: DbPool,
}

impl DieselAppointmentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_appointment(row: AppointmentRow) -> Result<Appointment, PersistenceError> {
    Ok(Appointment {
        id: row.id,
        patient_id: UserId::from_uuid(row.patient_id),
        doctor_id: UserId::from_uuid(row.doctor_id),
        appointment_date: row.appointment_date,
        duration_minutes: to_u32(row.duration_minutes, "duration_minutes")?,
        status: parse_column(&row.status, "appointment status")?,
        reason: row.reason,
        notes: row.notes,
        cancellation_reason: row.cancellation_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn appointment_to_row(appointment: &Appointment) -> Result<AppointmentRow, PersistenceError> {
    Ok(AppointmentRow {
        id: appointment.id,
        patient_id: *appointment.patient_id.as_uuid(),
        doctor_id: *appointment.doctor_id.as_uuid(),
        appointment_date: appointment.appointment_date,
        duration_minutes: to_i32(appointment.duration_minutes, "duration_minutes")?,
        status: appointment.status.as_str().to_owned(),
        reason: appointment.reason.clone(),
        notes: appointment.notes.clone(),
        cancellation_reason: appointment.cancellation_reason.clone(),
        created_at: appointment.created_at,
        updated_at: appointment.updated_at,
    })
}

fn participant_query(filter: AppointmentFilter) -> appointments::BoxedQuery<'static, Pg> {
    let mut query = appointments::table.into_boxed();
    query = match filter.participant {
        AppointmentParticipant::Patient(id) => {
            query.filter(appointments::patient_id.eq(*id.as_uuid()))
        }
        AppointmentParticipant::Doctor(id) => {
            query.filter(appointments::doctor_id.eq(*id.as_uuid()))
        }
    };
    if let Some(status) = filter.status {
        query = query.filter(appointments::status.eq(status.as_str()));
    }
    query
}

#[async_trait]
impl AppointmentRepository for DieselAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<(), PersistenceError> {
        let row = appointment_to_row(appointment)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(appointments::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AppointmentRow> = appointments::table
            .filter(appointments::id.eq(id))
            .select(AppointmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_appointment).transpose()
    }

    async fn has_conflict(
        &self,
        doctor_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let earliest = start - TimeDelta::minutes(i64::from(DURATION_MAX));
        let mut query = appointments::table
            .filter(appointments::doctor_id.eq(doctor_id.as_uuid()))
            .filter(appointments::status.eq_any(BLOCKING_STATUSES))
            .filter(appointments::appointment_date.lt(end))
            .filter(appointments::appointment_date.gt(earliest))
            .into_boxed();
        if let Some(id) = exclude {
            query = query.filter(appointments::id.ne(id));
        }
        let candidates: Vec<(DateTime<Utc>, i32)> = query
            .select((appointments::appointment_date, appointments::duration_minutes))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(candidates.into_iter().any(|(begins, minutes)| {
            let ends = begins + TimeDelta::minutes(i64::from(minutes));
            intervals_overlap((begins, ends), (start, end))
        }))
    }

    async fn list(
        &self,
        filter: AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = participant_query(filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<AppointmentRow> = participant_query(filter)
            .select(AppointmentRow::as_select())
            .order_by(appointments::appointment_date.desc())
            .offset(page.offset_i64())
            .limit(page.limit_i64())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let items = collect_rows(rows.into_iter().map(row_to_appointment))?;
        Ok(Page::new(items, to_count(total), page))
    }

    async fn doctor_schedule(
        &self,
        doctor_id: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = appointments::table
            .filter(appointments::doctor_id.eq(doctor_id.as_uuid()))
            .filter(appointments::status.ne(AppointmentStatus::Cancelled.as_str()))
            .into_boxed();
        if let Some(from) = from {
            query = query.filter(appointments::appointment_date.ge(from));
        }
        if let Some(to) = to {
            query = query.filter(appointments::appointment_date.le(to));
        }
        let rows: Vec<AppointmentRow> = query
            .select(AppointmentRow::as_select())
            .order_by(appointments::appointment_date.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(rows.into_iter().map(row_to_appointment))
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changes = AppointmentUpdate {
            appointment_date: appointment.appointment_date,
            duration_minutes: to_i32(appointment.duration_minutes, "duration_minutes")?,
            status: appointment.status.as_str(),
            notes: appointment.notes.as_deref(),
            cancellation_reason: appointment.cancellation_reason.as_deref(),
            updated_at: appointment.updated_at,
        };
        let updated = diesel::update(appointments::table.filter(appointments::id.eq(appointment.id)))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if updated == 0 {
            return Err(PersistenceError::query("appointment not found"));
        }
        Ok(())
    }
}
