//! Port for invoices, their items and payments.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Invoice, InvoiceStatus, Payment, Settlement, UserId};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Store an invoice together with its items.
    async fn insert(&self, invoice: &Invoice) -> Result<(), PersistenceError>;

    /// Fetch by identifier, items included.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, PersistenceError>;

    /// Invoices of one patient, or all invoices when `patient` is `None`,
    /// newest first.
    async fn list(
        &self,
        patient: Option<UserId>,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, PersistenceError>;

    /// Apply `settlement` and record `payment` atomically.
    ///
    /// The update only applies while the invoice is neither paid nor
    /// cancelled and its stored balance still equals
    /// `settlement.expected_balance`; returns `false` otherwise.
    async fn apply_payment(
        &self,
        invoice_id: Uuid,
        settlement: &Settlement,
        payment: &Payment,
    ) -> Result<bool, PersistenceError>;

    /// Payments recorded against an invoice, oldest first.
    async fn list_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, PersistenceError>;

    /// Mark an invoice cancelled unless it is already paid or cancelled.
    ///
    /// Returns `false` when the stored status no longer allows it.
    async fn cancel(&self, id: Uuid, updated_at: DateTime<Utc>)
    -> Result<bool, PersistenceError>;
}
