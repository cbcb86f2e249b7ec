//! Prescription issuing, review, cancellation and refills.

use std::sync::Arc;

use mockable::Clock;
use rand::Rng;
use rand::rngs::OsRng;
use tracing::info;
use uuid::Uuid;

use super::ports::{PrescriptionRepository, UserRepository};
use super::prescription::{DIAGNOSIS_MAX, DIAGNOSIS_MIN, DURATION_DAYS_MAX, REFILLS_MAX};
use super::{
    Actor, Error, Medication, Prescription, PrescriptionOwner, PrescriptionStatus, Role, UserId,
    expiry_for, prescription_number,
};

const NAME_LENGTH: (usize, usize) = (2, 255);
const DOSAGE_LENGTH: (usize, usize) = (2, 100);
const FREQUENCY_LENGTH: (usize, usize) = (2, 100);

/// Medication line of a new prescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedication {
    /// Drug name.
    pub medication_name: String,
    /// Dose per intake.
    pub dosage: String,
    /// Intake frequency.
    pub frequency: String,
    /// Course length in days.
    pub duration_days: u32,
    /// Units dispensed.
    pub quantity: u32,
    /// Refills granted.
    pub refills_allowed: u32,
    /// Patient instructions.
    pub instructions: Option<String>,
}

/// Prescription issued by a doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrescription {
    /// Receiving patient.
    pub patient_id: UserId,
    /// Related appointment.
    pub appointment_id: Option<Uuid>,
    /// Diagnosis text.
    pub diagnosis: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// At least one medication.
    pub medications: Vec<NewMedication>,
}

/// Prescription service.
#[derive(Clone)]
pub struct PrescriptionService {
    prescriptions: Arc<dyn PrescriptionRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), Error> {
    let length = value.trim().chars().count();
    if (min..=max).contains(&length) {
        return Ok(());
    }
    Err(Error::invalid_request(format!(
        "{field} must be between {min} and {max} characters"
    )))
}

fn validate_medication(medication: &NewMedication) -> Result<(), Error> {
    check_length("medicationName", &medication.medication_name, NAME_LENGTH)?;
    check_length("dosage", &medication.dosage, DOSAGE_LENGTH)?;
    check_length("frequency", &medication.frequency, FREQUENCY_LENGTH)?;
    if !(1..=DURATION_DAYS_MAX).contains(&medication.duration_days) {
        return Err(Error::invalid_request(format!(
            "durationDays must be between 1 and {DURATION_DAYS_MAX}"
        )));
    }
    if medication.quantity == 0 {
        return Err(Error::invalid_request("quantity must be greater than 0"));
    }
    if medication.refills_allowed > REFILLS_MAX {
        return Err(Error::invalid_request(format!(
            "refillsAllowed must be between 0 and {REFILLS_MAX}"
        )));
    }
    Ok(())
}

impl PrescriptionService {
    /// Create the service.
    pub fn new(
        prescriptions: Arc<dyn PrescriptionRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prescriptions,
            users,
            clock,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Prescription, Error> {
        self.prescriptions
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("prescription not found"))
    }

    /// Issue a prescription. Doctors only.
    pub async fn create(
        &self,
        actor: &Actor,
        request: NewPrescription,
    ) -> Result<Prescription, Error> {
        actor.require_any(&[Role::Doctor])?;
        check_length("diagnosis", &request.diagnosis, (DIAGNOSIS_MIN, DIAGNOSIS_MAX))?;
        if request.medications.is_empty() {
            return Err(Error::invalid_request(
                "at least one medication is required",
            ));
        }
        request.medications.iter().try_for_each(validate_medication)?;
        if self.users.find_by_id(&request.patient_id).await?.is_none() {
            return Err(Error::not_found("patient not found"));
        }

        let now = self.clock.utc();
        let id = Uuid::new_v4();
        let medications = request
            .medications
            .into_iter()
            .map(|line| Medication {
                id: Uuid::new_v4(),
                prescription_id: id,
                medication_name: line.medication_name.trim().to_owned(),
                dosage: line.dosage.trim().to_owned(),
                frequency: line.frequency.trim().to_owned(),
                duration_days: line.duration_days,
                quantity: line.quantity,
                refills_allowed: line.refills_allowed,
                refills_remaining: line.refills_allowed,
                instructions: line.instructions,
            })
            .collect();
        let prescription = Prescription {
            id,
            prescription_number: prescription_number(now, OsRng.r#gen()),
            patient_id: request.patient_id,
            doctor_id: actor.user_id,
            appointment_id: request.appointment_id,
            diagnosis: request.diagnosis.trim().to_owned(),
            notes: request.notes,
            status: PrescriptionStatus::Active,
            issued_date: now,
            expiry_date: expiry_for(now),
            medications,
            created_at: now,
            updated_at: now,
        };
        self.prescriptions.insert(&prescription).await?;
        info!(
            prescription_id = %prescription.id,
            doctor_id = %actor.user_id,
            patient_id = %prescription.patient_id,
            "prescription issued"
        );
        Ok(prescription)
    }

    /// Prescriptions written by (doctors) or for (everyone else) the caller.
    pub async fn my_prescriptions(
        &self,
        actor: &Actor,
        status: Option<PrescriptionStatus>,
    ) -> Result<Vec<Prescription>, Error> {
        let owner = if actor.role == Role::Doctor {
            PrescriptionOwner::Doctor(actor.user_id)
        } else {
            PrescriptionOwner::Patient(actor.user_id)
        };
        Ok(self.prescriptions.list(owner, status).await?)
    }

    /// One prescription, for its patient, its doctor or an admin.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Prescription, Error> {
        let prescription = self.load(id).await?;
        let allowed = actor.is_admin()
            || prescription.doctor_id == actor.user_id
            || prescription.patient_id == actor.user_id;
        if !allowed {
            return Err(Error::forbidden("not authorised to view this prescription"));
        }
        Ok(prescription)
    }

    /// Cancel an active prescription. Prescribing doctor only.
    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<Prescription, Error> {
        let mut prescription = self.load(id).await?;
        if prescription.doctor_id != actor.user_id {
            return Err(Error::forbidden(
                "only the prescribing doctor can cancel this prescription",
            ));
        }
        if prescription.status != PrescriptionStatus::Active {
            return Err(Error::invalid_request(format!(
                "cannot cancel a {} prescription",
                prescription.status
            )));
        }
        let now = self.clock.utc();
        self.prescriptions
            .update_status(id, PrescriptionStatus::Cancelled, now)
            .await?;
        prescription.status = PrescriptionStatus::Cancelled;
        prescription.updated_at = now;
        info!(prescription_id = %id, "prescription cancelled");
        Ok(prescription)
    }

    /// Use one refill of a medication. Owning patient only.
    ///
    /// The stored count is decremented conditionally, so concurrent requests
    /// cannot drive it below zero.
    pub async fn request_refill(
        &self,
        actor: &Actor,
        id: Uuid,
        medication_id: Uuid,
    ) -> Result<Medication, Error> {
        let prescription = self.load(id).await?;
        if prescription.patient_id != actor.user_id {
            return Err(Error::forbidden(
                "only the patient can request refills for this prescription",
            ));
        }
        let now = self.clock.utc();
        if !prescription.is_refillable_at(now) {
            return Err(Error::invalid_request("prescription is not active"));
        }
        let Some(medication) = prescription.medication(medication_id).cloned() else {
            return Err(Error::not_found("medication not found"));
        };
        let Some(remaining) = self
            .prescriptions
            .decrement_refill(id, medication_id, now)
            .await?
        else {
            if medication.refills_remaining > 0 {
                return Err(Error::conflict(
                    "prescription changed while the refill was processed; retry",
                ));
            }
            return Err(Error::invalid_request("no refills remaining"));
        };
        info!(prescription_id = %id, medication_id = %medication_id, remaining, "refill granted");
        Ok(Medication {
            refills_remaining: remaining,
            ..medication
        })
    }
}

#[cfg(test)]
#[path = "prescription_service_tests.rs"]
mod tests;
