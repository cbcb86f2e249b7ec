//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain repository ports backed by
//! PostgreSQL via Diesel with async support through `diesel-async` and `bb8`
//! connection pooling. Row structs (`models.rs`) and the table definitions
//! (`schema.rs`) stay private to this module; adapters only translate between
//! rows and domain types.
//!
//! # Example
//!
//! ```ignore
//! use medisecure::outbound::persistence::{DbPool, PoolConfig, DieselUserRepository};
//!
//! let config = PoolConfig::new("postgres://localhost/medisecure");
//! let pool = DbPool::new(config).await?;
//! let repo = DieselUserRepository::new(pool);
//! ```

pub(crate) mod diesel_helpers;
mod diesel_appointment_repository;
mod diesel_audit_log_repository;
mod diesel_device_repository;
mod diesel_invoice_repository;
mod diesel_message_repository;
mod diesel_prescription_repository;
mod diesel_profile_repository;
mod diesel_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_appointment_repository::DieselAppointmentRepository;
pub use diesel_audit_log_repository::DieselAuditLogRepository;
pub use diesel_device_repository::DieselDeviceRepository;
pub use diesel_invoice_repository::DieselInvoiceRepository;
pub use diesel_message_repository::DieselMessageRepository;
pub use diesel_prescription_repository::DieselPrescriptionRepository;
pub use diesel_profile_repository::DieselProfileRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
