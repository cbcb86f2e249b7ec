//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and remain testable without I/O.

use std::sync::Arc;

use mockable::Clock;

use crate::domain::ports::{
    AccessTokenCodec, AppointmentRepository, AuditLogRepository, DeviceRepository, ExpiringStore,
    FieldCipher, InvoiceRepository, Mailer, MessageRepository, PasswordHasher,
    PrescriptionRepository, ProfileRepository, UserRepository,
};
use crate::domain::{
    AccountService, AccountServicePorts, AdminService, AdminServicePorts, AppointmentService,
    AuthPolicy, AuthService, AuthServicePorts, BillingService, MessagingService,
    PrescriptionService,
};

use super::cookies::CookieSettings;

/// Parameter object bundling every driven port the HTTP adapter needs.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub users: Arc<dyn UserRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub prescriptions: Arc<dyn PrescriptionRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
    pub store: Arc<dyn ExpiringStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn AccessTokenCodec>,
    pub mailer: Arc<dyn Mailer>,
    pub cipher: Arc<dyn FieldCipher>,
    pub clock: Arc<dyn Clock>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub auth: AuthService,
    pub accounts: AccountService,
    pub admin: AdminService,
    pub appointments: AppointmentService,
    pub prescriptions: PrescriptionService,
    pub messages: MessagingService,
    pub billing: BillingService,
    /// Audit sink written by the audit middleware.
    pub audit_logs: Arc<dyn AuditLogRepository>,
    pub clock: Arc<dyn Clock>,
    pub cookies: CookieSettings,
}

impl HttpState {
    /// Wire every service over one set of ports.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use medisecure::domain::AuthPolicy;
    /// use medisecure::inbound::http::cookies::CookieSettings;
    /// use medisecure::inbound::http::state::{HttpState, HttpStatePorts};
    /// use medisecure::outbound::mail::LoggingMailer;
    /// use medisecure::outbound::memory::*;
    /// use medisecure::outbound::security::{
    ///     AesGcmFieldCipher, Argon2PasswordHasher, JwtAccessTokenCodec,
    /// };
    /// use mockable::DefaultClock;
    /// use zeroize::Zeroizing;
    ///
    /// let clock = Arc::new(DefaultClock);
    /// let secret = Zeroizing::new(vec![1_u8; 32]);
    /// let ports = HttpStatePorts {
    ///     users: Arc::new(InMemoryUserRepository::default()),
    ///     devices: Arc::new(InMemoryDeviceRepository::default()),
    ///     profiles: Arc::new(InMemoryProfileRepository::default()),
    ///     appointments: Arc::new(InMemoryAppointmentRepository::default()),
    ///     prescriptions: Arc::new(InMemoryPrescriptionRepository::default()),
    ///     messages: Arc::new(InMemoryMessageRepository::default()),
    ///     invoices: Arc::new(InMemoryInvoiceRepository::default()),
    ///     audit_logs: Arc::new(InMemoryAuditLogRepository::default()),
    ///     store: Arc::new(InMemoryExpiringStore::default()),
    ///     hasher: Arc::new(Argon2PasswordHasher::default()),
    ///     tokens: Arc::new(JwtAccessTokenCodec::new(&secret, clock.clone())),
    ///     mailer: Arc::new(LoggingMailer),
    ///     cipher: Arc::new(AesGcmFieldCipher::new(&secret).expect("32-byte key")),
    ///     clock,
    /// };
    /// let state = HttpState::new(ports, AuthPolicy::default(), CookieSettings::default());
    /// assert!(state.cookies.secure);
    /// ```
    pub fn new(ports: HttpStatePorts, policy: AuthPolicy, cookies: CookieSettings) -> Self {
        let auth = AuthService::new(
            AuthServicePorts {
                users: ports.users.clone(),
                devices: ports.devices.clone(),
                store: ports.store.clone(),
                hasher: ports.hasher.clone(),
                tokens: ports.tokens.clone(),
                mailer: ports.mailer.clone(),
                clock: ports.clock.clone(),
            },
            policy,
        );
        let refresh_tokens = auth.refresh_tokens().clone();
        let accounts = AccountService::new(AccountServicePorts {
            users: ports.users.clone(),
            devices: ports.devices.clone(),
            profiles: ports.profiles.clone(),
            hasher: ports.hasher.clone(),
            cipher: ports.cipher.clone(),
            refresh_tokens: refresh_tokens.clone(),
            clock: ports.clock.clone(),
        });
        let admin = AdminService::new(AdminServicePorts {
            users: ports.users.clone(),
            devices: ports.devices.clone(),
            audit_logs: ports.audit_logs.clone(),
            refresh_tokens,
            clock: ports.clock.clone(),
        });
        Self {
            auth,
            accounts,
            admin,
            appointments: AppointmentService::new(
                ports.appointments,
                ports.users.clone(),
                ports.clock.clone(),
            ),
            prescriptions: PrescriptionService::new(
                ports.prescriptions,
                ports.users.clone(),
                ports.clock.clone(),
            ),
            messages: MessagingService::new(
                ports.messages,
                ports.users.clone(),
                ports.cipher,
                ports.clock.clone(),
            ),
            billing: BillingService::new(ports.invoices, ports.users, ports.clock.clone()),
            audit_logs: ports.audit_logs,
            clock: ports.clock,
            cookies,
        }
    }
}
