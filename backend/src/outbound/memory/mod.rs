//! In-process adapters used when no database or Redis is configured, and by
//! the test suites.

mod accounts;
mod clinical;
mod expiring_store;

pub use accounts::{InMemoryDeviceRepository, InMemoryProfileRepository, InMemoryUserRepository};
pub use clinical::{
    InMemoryAppointmentRepository, InMemoryAuditLogRepository, InMemoryInvoiceRepository,
    InMemoryMessageRepository, InMemoryPrescriptionRepository,
};
pub use expiring_store::InMemoryExpiringStore;
