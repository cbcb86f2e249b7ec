//! PostgreSQL-backed `PrescriptionRepository` implementation using Diesel ORM.
//!
//! Refill decrements are a single conditional `UPDATE ... RETURNING`, so the
//! remaining count can never drop below zero under concurrent requests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{PersistenceError, PrescriptionRepository};
use crate::domain::{Medication, Prescription, PrescriptionOwner, PrescriptionStatus, UserId};

use super::diesel_helpers::{
    collect_rows, map_diesel_error, map_pool_error, parse_column, to_i32, to_u32,
};
use super::models::{MedicationRow, PrescriptionRow};
use super::pool::DbPool;
use super::schema::{prescription_medications, prescriptions};

/// Diesel-backed implementation of the `PrescriptionRepository` port.
#[derive(Clone)]
pub struct DieselPrescriptionRepository {
    pool: DbPool,
}

impl DieselPrescriptionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_medication(row: MedicationRow) -> Result<Medication, PersistenceError> {
    Ok(Medication {
        id: row.id,
        prescription_id: row.prescription_id,
        medication_name: row.medication_name,
        dosage: row.dosage,
        frequency: row.frequency,
        duration_days: to_u32(row.duration_days, "duration_days")?,
        quantity: to_u32(row.quantity, "quantity")?,
        refills_allowed: to_u32(row.refills_allowed, "refills_allowed")?,
        refills_remaining: to_u32(row.refills_remaining, "refills_remaining")?,
        instructions: row.instructions,
    })
}

fn medication_to_row(position: usize, medication: &Medication) -> Result<MedicationRow, PersistenceError> {
    Ok(MedicationRow {
        id: medication.id,
        prescription_id: medication.prescription_id,
        position: i32::try_from(position)
            .map_err(|_| PersistenceError::query("too many medications"))?,
        medication_name: medication.medication_name.clone(),
        dosage: medication.dosage.clone(),
        frequency: medication.frequency.clone(),
        duration_days: to_i32(medication.duration_days, "duration_days")?,
        quantity: to_i32(medication.quantity, "quantity")?,
        refills_allowed: to_i32(medication.refills_allowed, "refills_allowed")?,
        refills_remaining: to_i32(medication.refills_remaining, "refills_remaining")?,
        instructions: medication.instructions.clone(),
    })
}

fn assemble(
    row: PrescriptionRow,
    medications: Vec<MedicationRow>,
) -> Result<Prescription, PersistenceError> {
    Ok(Prescription {
        id: row.id,
        prescription_number: row.prescription_number,
        patient_id: UserId::from_uuid(row.patient_id),
        doctor_id: UserId::from_uuid(row.doctor_id),
        appointment_id: row.appointment_id,
        diagnosis: row.diagnosis,
        notes: row.notes,
        status: parse_column(&row.status, "prescription status")?,
        issued_date: row.issued_date,
        expiry_date: row.expiry_date,
        medications: collect_rows(medications.into_iter().map(row_to_medication))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn load_medications(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<MedicationRow>>, PersistenceError> {
    let rows: Vec<MedicationRow> = prescription_medications::table
        .filter(prescription_medications::prescription_id.eq_any(ids))
        .select(MedicationRow::as_select())
        .order_by((
            prescription_medications::prescription_id,
            prescription_medications::position,
        ))
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    let mut grouped: HashMap<Uuid, Vec<MedicationRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.prescription_id).or_default().push(row);
    }
    Ok(grouped)
}

#[async_trait]
impl PrescriptionRepository for DieselPrescriptionRepository {
    async fn insert(&self, prescription: &Prescription) -> Result<(), PersistenceError> {
        let header = PrescriptionRow {
            id: prescription.id,
            prescription_number: prescription.prescription_number.clone(),
            patient_id: *prescription.patient_id.as_uuid(),
            doctor_id: *prescription.doctor_id.as_uuid(),
            appointment_id: prescription.appointment_id,
            diagnosis: prescription.diagnosis.clone(),
            notes: prescription.notes.clone(),
            status: prescription.status.as_str().to_owned(),
            issued_date: prescription.issued_date,
            expiry_date: prescription.expiry_date,
            created_at: prescription.created_at,
            updated_at: prescription.updated_at,
        };
        let lines = collect_rows(
            prescription
                .medications
                .iter()
                .enumerate()
                .map(|(position, medication)| medication_to_row(position, medication)),
        )?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                diesel::insert_into(prescriptions::table)
                    .values(&header)
                    .execute(conn)
                    .await?;
                diesel::insert_into(prescription_medications::table)
                    .values(&lines)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Prescription>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PrescriptionRow> = prescriptions::table
            .filter(prescriptions::id.eq(id))
            .select(PrescriptionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut medications = load_medications(&mut conn, &[id]).await?;
        assemble(row, medications.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn list(
        &self,
        owner: PrescriptionOwner,
        status: Option<PrescriptionStatus>,
    ) -> Result<Vec<Prescription>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = prescriptions::table.into_boxed();
        query = match owner {
            PrescriptionOwner::Patient(id) => {
                query.filter(prescriptions::patient_id.eq(*id.as_uuid()))
            }
            PrescriptionOwner::Doctor(id) => {
                query.filter(prescriptions::doctor_id.eq(*id.as_uuid()))
            }
        };
        if let Some(status) = status {
            query = query.filter(prescriptions::status.eq(status.as_str()));
        }
        let rows: Vec<PrescriptionRow> = query
            .select(PrescriptionRow::as_select())
            .order_by(prescriptions::issued_date.desc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut medications = load_medications(&mut conn, &ids).await?;
        collect_rows(rows.into_iter().map(|row| {
            let lines = medications.remove(&row.id).unwrap_or_default();
            assemble(row, lines)
        }))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PrescriptionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(prescriptions::table.filter(prescriptions::id.eq(id)))
            .set((
                prescriptions::status.eq(status.as_str()),
                prescriptions::updated_at.eq(updated_at),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn decrement_refill(
        &self,
        prescription_id: Uuid,
        medication_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<u32>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let remaining: Option<i32> = conn
            .transaction(|conn| {
                async move {
                    let remaining: Option<i32> = diesel::update(
                        prescription_medications::table.filter(
                            prescription_medications::id
                                .eq(medication_id)
                                .and(prescription_medications::prescription_id.eq_any(
                                    prescriptions::table
                                        .filter(prescriptions::id.eq(prescription_id))
                                        .filter(
                                            prescriptions::status
                                                .eq(PrescriptionStatus::Active.as_str()),
                                        )
                                        .select(prescriptions::id),
                                ))
                                .and(prescription_medications::refills_remaining.gt(0)),
                        ),
                    )
                    .set(
                        prescription_medications::refills_remaining
                            .eq(prescription_medications::refills_remaining - 1),
                    )
                    .returning(prescription_medications::refills_remaining)
                    .get_result(conn)
                    .await
                    .optional()?;
                    if remaining.is_some() {
                        diesel::update(prescriptions::table.filter(prescriptions::id.eq(prescription_id)))
                            .set(prescriptions::updated_at.eq(updated_at))
                            .execute(conn)
                            .await?;
                    }
                    Ok(remaining)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        remaining
            .map(|value| to_u32(value, "refills_remaining"))
            .transpose()
    }
}
