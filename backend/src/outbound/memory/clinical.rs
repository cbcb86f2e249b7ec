//! In-memory appointment, prescription, message, invoice and audit
//! repositories.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::{Page, PageRequest};
use uuid::Uuid;

use crate::domain::ports::{
    AppointmentRepository, AuditLogRepository, InvoiceRepository, MessageRepository,
    PersistenceError, PrescriptionRepository,
};
use crate::domain::{
    Appointment, AppointmentFilter, AppointmentParticipant, AppointmentStatus, AuditAction,
    AuditFilter, AuditLog, AuditStatus, Invoice, InvoiceStatus, MailboxSide, Message, Payment,
    Prescription, PrescriptionOwner, PrescriptionStatus, Settlement, UserId, intervals_overlap,
};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// [`AppointmentRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<(), PersistenceError> {
        guard(&self.appointments).insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, PersistenceError> {
        Ok(guard(&self.appointments).get(&id).cloned())
    }

    async fn has_conflict(
        &self,
        doctor_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool, PersistenceError> {
        Ok(guard(&self.appointments).values().any(|existing| {
            existing.doctor_id == *doctor_id
                && existing.status.blocks_schedule()
                && Some(existing.id) != exclude
                && intervals_overlap(
                    (existing.appointment_date, existing.ends_at()),
                    (start, end),
                )
        }))
    }

    async fn list(
        &self,
        filter: AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, PersistenceError> {
        let mut matching: Vec<Appointment> = guard(&self.appointments)
            .values()
            .filter(|a| match filter.participant {
                AppointmentParticipant::Patient(id) => a.patient_id == id,
                AppointmentParticipant::Doctor(id) => a.doctor_id == id,
            })
            .filter(|a| filter.status.is_none_or(|status| a.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
        let total = matching.len() as u64;
        Ok(Page::new(page.apply(matching), total, page))
    }

    async fn doctor_schedule(
        &self,
        doctor_id: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, PersistenceError> {
        let mut schedule: Vec<Appointment> = guard(&self.appointments)
            .values()
            .filter(|a| a.doctor_id == *doctor_id && a.status != AppointmentStatus::Cancelled)
            .filter(|a| from.is_none_or(|from| a.appointment_date >= from))
            .filter(|a| to.is_none_or(|to| a.appointment_date <= to))
            .cloned()
            .collect();
        schedule.sort_by(|a, b| a.appointment_date.cmp(&b.appointment_date));
        Ok(schedule)
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), PersistenceError> {
        let mut appointments = guard(&self.appointments);
        let stored = appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| PersistenceError::query("appointment not found"))?;
        *stored = appointment.clone();
        Ok(())
    }
}

/// [`PrescriptionRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryPrescriptionRepository {
    prescriptions: Mutex<HashMap<Uuid, Prescription>>,
}

#[async_trait]
impl PrescriptionRepository for InMemoryPrescriptionRepository {
    async fn insert(&self, prescription: &Prescription) -> Result<(), PersistenceError> {
        guard(&self.prescriptions).insert(prescription.id, prescription.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Prescription>, PersistenceError> {
        Ok(guard(&self.prescriptions).get(&id).cloned())
    }

    async fn list(
        &self,
        owner: PrescriptionOwner,
        status: Option<PrescriptionStatus>,
    ) -> Result<Vec<Prescription>, PersistenceError> {
        let mut matching: Vec<Prescription> = guard(&self.prescriptions)
            .values()
            .filter(|rx| match owner {
                PrescriptionOwner::Patient(id) => rx.patient_id == id,
                PrescriptionOwner::Doctor(id) => rx.doctor_id == id,
            })
            .filter(|rx| status.is_none_or(|status| rx.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.issued_date.cmp(&a.issued_date));
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PrescriptionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        if let Some(rx) = guard(&self.prescriptions).get_mut(&id) {
            rx.status = status;
            rx.updated_at = updated_at;
        }
        Ok(())
    }

    async fn decrement_refill(
        &self,
        prescription_id: Uuid,
        medication_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<u32>, PersistenceError> {
        let mut prescriptions = guard(&self.prescriptions);
        let Some(rx) = prescriptions
            .get_mut(&prescription_id)
            .filter(|rx| rx.status == PrescriptionStatus::Active)
        else {
            return Ok(None);
        };
        let Some(medication) = rx.medications.iter_mut().find(|m| m.id == medication_id) else {
            return Ok(None);
        };
        let Some(remaining) = medication.refills_remaining.checked_sub(1) else {
            return Ok(None);
        };
        medication.refills_remaining = remaining;
        rx.updated_at = updated_at;
        Ok(Some(remaining))
    }
}

/// [`MessageRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<HashMap<Uuid, Message>>,
}

impl InMemoryMessageRepository {
    fn newest_first(
        &self,
        limit: u32,
        keep: impl Fn(&Message) -> bool,
    ) -> Vec<Message> {
        let mut matching: Vec<Message> = guard(&self.messages)
            .values()
            .filter(|m| keep(m))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(take(limit));
        matching
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), PersistenceError> {
        guard(&self.messages).insert(message.id, message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, PersistenceError> {
        Ok(guard(&self.messages).get(&id).cloned())
    }

    async fn inbox(
        &self,
        recipient: &UserId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Message>, PersistenceError> {
        Ok(self.newest_first(limit, |m| {
            m.recipient_id == *recipient && !m.deleted_by_recipient && (!unread_only || !m.is_read)
        }))
    }

    async fn unread_count(&self, recipient: &UserId) -> Result<u64, PersistenceError> {
        Ok(guard(&self.messages)
            .values()
            .filter(|m| m.recipient_id == *recipient && !m.deleted_by_recipient && !m.is_read)
            .count() as u64)
    }

    async fn sent(&self, sender: &UserId, limit: u32) -> Result<Vec<Message>, PersistenceError> {
        Ok(self.newest_first(limit, |m| {
            m.sender_id == *sender && !m.deleted_by_sender
        }))
    }

    async fn mark_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<(), PersistenceError> {
        let mut messages = guard(&self.messages);
        if let Some(message) = messages.get_mut(&id).filter(|m| !m.is_read) {
            message.is_read = true;
            message.read_at = Some(read_at);
        }
        Ok(())
    }

    async fn mark_deleted(&self, id: Uuid, side: MailboxSide) -> Result<(), PersistenceError> {
        if let Some(message) = guard(&self.messages).get_mut(&id) {
            match side {
                MailboxSide::Sender => message.deleted_by_sender = true,
                MailboxSide::Recipient => message.deleted_by_recipient = true,
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Ledger {
    invoices: HashMap<Uuid, Invoice>,
    payments: Vec<Payment>,
}

/// [`InvoiceRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryInvoiceRepository {
    ledger: Mutex<Ledger>,
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), PersistenceError> {
        guard(&self.ledger).invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, PersistenceError> {
        Ok(guard(&self.ledger).invoices.get(&id).cloned())
    }

    async fn list(
        &self,
        patient: Option<UserId>,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, PersistenceError> {
        let mut matching: Vec<Invoice> = guard(&self.ledger)
            .invoices
            .values()
            .filter(|inv| patient.is_none_or(|id| inv.patient_id == id))
            .filter(|inv| status.is_none_or(|status| inv.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn apply_payment(
        &self,
        invoice_id: Uuid,
        settlement: &Settlement,
        payment: &Payment,
    ) -> Result<bool, PersistenceError> {
        let mut ledger = guard(&self.ledger);
        let Some(invoice) = ledger.invoices.get_mut(&invoice_id) else {
            return Ok(false);
        };
        if !invoice.status.accepts_payments() || invoice.balance_due != settlement.expected_balance
        {
            return Ok(false);
        }
        invoice.amount_paid = settlement.amount_paid;
        invoice.balance_due = settlement.balance_due;
        invoice.status = settlement.status;
        invoice.paid_date = settlement.paid_date;
        invoice.updated_at = payment.created_at;
        ledger.payments.push(payment.clone());
        Ok(true)
    }

    async fn list_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, PersistenceError> {
        let mut payments: Vec<Payment> = guard(&self.ledger)
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.payment_date.cmp(&b.payment_date));
        Ok(payments)
    }

    async fn cancel(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let mut ledger = guard(&self.ledger);
        let Some(invoice) = ledger
            .invoices
            .get_mut(&id)
            .filter(|invoice| invoice.status.accepts_payments())
        else {
            return Ok(false);
        };
        invoice.status = InvoiceStatus::Cancelled;
        invoice.updated_at = updated_at;
        Ok(true)
    }
}

/// [`AuditLogRepository`] backed by a vector.
#[derive(Default)]
pub struct InMemoryAuditLogRepository {
    entries: Mutex<Vec<AuditLog>>,
}

impl InMemoryAuditLogRepository {
    /// Every recorded entry in insertion order.
    pub fn entries(&self) -> Vec<AuditLog> {
        guard(&self.entries).clone()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn record(&self, entry: &AuditLog) -> Result<(), PersistenceError> {
        guard(&self.entries).push(entry.clone());
        Ok(())
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, PersistenceError> {
        let mut matching: Vec<AuditLog> = guard(&self.entries)
            .iter()
            .filter(|e| filter.user_id.is_none_or(|id| e.user_id == Some(id)))
            .filter(|e| filter.action.as_ref().is_none_or(|action| e.action == *action))
            .filter(|e| filter.status.is_none_or(|status| e.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        Ok(Page::new(page.apply(matching), total, page))
    }

    async fn count_since(
        &self,
        since: DateTime<Utc>,
        action: Option<AuditAction>,
        status: Option<AuditStatus>,
    ) -> Result<u64, PersistenceError> {
        Ok(guard(&self.entries)
            .iter()
            .filter(|e| e.created_at >= since)
            .filter(|e| action.as_ref().is_none_or(|action| e.action == *action))
            .filter(|e| status.is_none_or(|status| e.status == status))
            .count() as u64)
    }
}
