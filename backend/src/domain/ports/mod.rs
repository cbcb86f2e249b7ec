//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (PostgreSQL, Redis, SMTP, cryptographic primitives). Each trait exposes
//! strongly typed errors so adapters map their failures into predictable
//! variants, and each error converts into the transport-agnostic
//! [`crate::domain::Error`].

mod macros;
pub(crate) use macros::define_port_error;

mod access_token_codec;
mod appointment_repository;
mod audit_log_repository;
mod device_repository;
mod expiring_store;
mod field_cipher;
mod invoice_repository;
mod mailer;
mod message_repository;
mod password_hasher;
mod persistence_error;
mod prescription_repository;
mod profile_repository;
mod user_repository;

#[cfg(test)]
pub use access_token_codec::MockAccessTokenCodec;
pub use access_token_codec::{AccessTokenCodec, AccessTokenError};
#[cfg(test)]
pub use appointment_repository::MockAppointmentRepository;
pub use appointment_repository::AppointmentRepository;
#[cfg(test)]
pub use audit_log_repository::MockAuditLogRepository;
pub use audit_log_repository::AuditLogRepository;
#[cfg(test)]
pub use device_repository::MockDeviceRepository;
pub use device_repository::DeviceRepository;
#[cfg(test)]
pub use expiring_store::MockExpiringStore;
pub use expiring_store::{ExpiringStore, ExpiringStoreError};
#[cfg(test)]
pub use field_cipher::MockFieldCipher;
pub use field_cipher::{FieldCipher, FieldCipherError};
#[cfg(test)]
pub use invoice_repository::MockInvoiceRepository;
pub use invoice_repository::InvoiceRepository;
#[cfg(test)]
pub use mailer::MockMailer;
pub use mailer::{MailMessage, Mailer, MailerError};
#[cfg(test)]
pub use message_repository::MockMessageRepository;
pub use message_repository::MessageRepository;
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use password_hasher::{PasswordHashError, PasswordHasher};
pub use persistence_error::PersistenceError;
#[cfg(test)]
pub use prescription_repository::MockPrescriptionRepository;
pub use prescription_repository::PrescriptionRepository;
#[cfg(test)]
pub use profile_repository::MockProfileRepository;
pub use profile_repository::ProfileRepository;
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserCounts, UserListFilter, UserRepository};
