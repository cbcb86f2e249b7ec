//! Domain primitives, aggregates and services.
//!
//! Purpose: Define strongly typed domain entities used by the API and
//! persistence layers, plus the services that enforce the clinical and
//! authentication rules over the ports in [`ports`]. Keep types free of
//! transport concerns; HTTP DTOs live in `inbound::http`.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — API error response payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - User, Role, Email — account identity and access role.
//! - Appointment, Prescription, Message, Invoice, AuditLog — clinical and
//!   administrative records.
//! - `*Service` types — use-case orchestration over ports.

pub mod account_service;
pub mod admin_service;
pub mod appointment;
pub mod appointment_service;
pub mod audit;
pub mod auth;
pub mod auth_service;
pub mod billing;
pub mod billing_service;
pub mod device;
pub mod error;
pub mod message;
pub mod messaging_service;
pub mod ports;
pub mod prescription;
pub mod prescription_service;
pub mod profile;
mod refresh_tokens;
mod trace_id;
pub mod user;

pub use self::account_service::{
    AccountChanges, AccountService, AccountServicePorts, PASSWORD_HISTORY_DEPTH,
};
pub use self::admin_service::{AdminService, AdminServicePorts, STATS_WINDOW_HOURS, SystemStats};
pub use self::appointment::{
    Appointment, AppointmentFilter, AppointmentParticipant, AppointmentStatus,
    UnknownAppointmentStatus, intervals_overlap, slot_end,
};
pub use self::appointment_service::{
    AppointmentChanges, AppointmentService, NewAppointment, ScheduleWindow,
};
pub use self::audit::{
    AuditAction, AuditFilter, AuditLog, AuditResource, AuditStatus, truncate_user_agent,
};
pub use self::auth::{
    AccessClaims, Actor, DeviceChallenge, DeviceContext, LoginCredentials, LoginOutcome,
    LoginValidationError, PasswordReset, PendingRegistration, RefreshOutcome, Registration,
    TokenPair, VerificationCode,
};
pub use self::auth_service::{AuthPolicy, AuthService, AuthServicePorts};
pub use self::billing::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, Payment, PaymentMethod,
    PaymentRejection, Settlement, TotalsError, UnknownBillingValue, compute_totals,
    invoice_number, line_total,
};
pub use self::billing_service::{
    BillingService, NewInvoice, NewInvoiceItem, NewPayment, PaymentReceipt,
};
pub use self::device::UserDevice;
pub use self::error::{Error, ErrorCode, ErrorValidationError, TRACE_ID_HEADER};
pub use self::message::{Inbox, MailboxSide, Message};
pub use self::messaging_service::{MessagingService, NewMessage};
pub use self::prescription::{
    Medication, Prescription, PrescriptionOwner, PrescriptionStatus, UnknownPrescriptionStatus,
    expiry_for, prescription_number,
};
pub use self::prescription_service::{NewMedication, NewPrescription, PrescriptionService};
pub use self::ports::{UserCounts, UserListFilter};
pub use self::profile::{ProfileDetails, ProfileUpdate, UserProfile};
pub use self::refresh_tokens::RefreshTokens;
pub use self::trace_id::TraceId;
pub use self::user::{Email, FullName, Role, User, UserId, UserValidationError, validate_password};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use medisecure::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
