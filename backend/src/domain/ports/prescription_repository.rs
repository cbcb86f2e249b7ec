//! Port for prescriptions and their medication lines.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Prescription, PrescriptionOwner, PrescriptionStatus};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    /// Store a prescription together with its medications.
    async fn insert(&self, prescription: &Prescription) -> Result<(), PersistenceError>;

    /// Fetch by identifier, medications included.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Prescription>, PersistenceError>;

    /// Prescriptions of a patient or doctor, newest issue date first.
    async fn list(
        &self,
        owner: PrescriptionOwner,
        status: Option<PrescriptionStatus>,
    ) -> Result<Vec<Prescription>, PersistenceError>;

    /// Set the status of a prescription.
    async fn update_status(
        &self,
        id: Uuid,
        status: PrescriptionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Decrement `refills_remaining` of one medication by one, only when it
    /// is positive and the prescription is still active.
    ///
    /// Returns the new remaining count, or `None` when either guard failed.
    async fn decrement_refill(
        &self,
        prescription_id: Uuid,
        medication_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<u32>, PersistenceError>;
}
