//! Builders wiring repository adapters into the HTTP state.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::info;

use medisecure::domain::ports::{
    AppointmentRepository, AuditLogRepository, DeviceRepository, ExpiringStore, FieldCipherError,
    InvoiceRepository, MessageRepository, PrescriptionRepository, ProfileRepository,
    UserRepository,
};
use medisecure::inbound::http::cookies::CookieSettings;
use medisecure::inbound::http::state::{HttpState, HttpStatePorts};
use medisecure::outbound::memory::{
    InMemoryAppointmentRepository, InMemoryAuditLogRepository, InMemoryDeviceRepository,
    InMemoryExpiringStore, InMemoryInvoiceRepository, InMemoryMessageRepository,
    InMemoryPrescriptionRepository, InMemoryProfileRepository, InMemoryUserRepository,
};
use medisecure::outbound::persistence::{
    DbPool, DieselAppointmentRepository, DieselAuditLogRepository, DieselDeviceRepository,
    DieselInvoiceRepository, DieselMessageRepository, DieselPrescriptionRepository,
    DieselProfileRepository, DieselUserRepository,
};
use medisecure::outbound::security::{
    AesGcmFieldCipher, Argon2PasswordHasher, JwtAccessTokenCodec,
};

use super::ServerConfig;

/// Repository ports, either all Diesel-backed or all in memory.
struct Repositories {
    users: Arc<dyn UserRepository>,
    devices: Arc<dyn DeviceRepository>,
    profiles: Arc<dyn ProfileRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    prescriptions: Arc<dyn PrescriptionRepository>,
    messages: Arc<dyn MessageRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    audit_logs: Arc<dyn AuditLogRepository>,
}

impl Repositories {
    fn diesel(pool: &DbPool) -> Self {
        Self {
            users: Arc::new(DieselUserRepository::new(pool.clone())),
            devices: Arc::new(DieselDeviceRepository::new(pool.clone())),
            profiles: Arc::new(DieselProfileRepository::new(pool.clone())),
            appointments: Arc::new(DieselAppointmentRepository::new(pool.clone())),
            prescriptions: Arc::new(DieselPrescriptionRepository::new(pool.clone())),
            messages: Arc::new(DieselMessageRepository::new(pool.clone())),
            invoices: Arc::new(DieselInvoiceRepository::new(pool.clone())),
            audit_logs: Arc::new(DieselAuditLogRepository::new(pool.clone())),
        }
    }

    fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            devices: Arc::new(InMemoryDeviceRepository::default()),
            profiles: Arc::new(InMemoryProfileRepository::default()),
            appointments: Arc::new(InMemoryAppointmentRepository::default()),
            prescriptions: Arc::new(InMemoryPrescriptionRepository::default()),
            messages: Arc::new(InMemoryMessageRepository::default()),
            invoices: Arc::new(InMemoryInvoiceRepository::default()),
            audit_logs: Arc::new(InMemoryAuditLogRepository::default()),
        }
    }

    fn from_pool(pool: Option<&DbPool>) -> Self {
        match pool {
            Some(pool) => {
                info!("using PostgreSQL repositories");
                Self::diesel(pool)
            }
            None => {
                info!("no database configured; data lives in process memory");
                Self::in_memory()
            }
        }
    }
}

fn build_store(config: &ServerConfig, clock: &Arc<dyn Clock>) -> Arc<dyn ExpiringStore> {
    match &config.redis {
        Some(store) => Arc::new(store.clone()),
        None => Arc::new(InMemoryExpiringStore::with_clock(clock.clone())),
    }
}

/// Build the shared HTTP state from the server configuration.
///
/// # Errors
/// Returns [`FieldCipherError`] when the field encryption key is rejected.
pub(super) fn build_http_state(config: &ServerConfig) -> Result<HttpState, FieldCipherError> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let repositories = Repositories::from_pool(config.db_pool.as_ref());
    let cipher = AesGcmFieldCipher::new(&config.security.field_key)?;
    let ports = HttpStatePorts {
        users: repositories.users,
        devices: repositories.devices,
        profiles: repositories.profiles,
        appointments: repositories.appointments,
        prescriptions: repositories.prescriptions,
        messages: repositories.messages,
        invoices: repositories.invoices,
        audit_logs: repositories.audit_logs,
        store: build_store(config, &clock),
        hasher: Arc::new(Argon2PasswordHasher::default()),
        tokens: Arc::new(JwtAccessTokenCodec::new(
            &config.security.jwt_secret,
            clock.clone(),
        )),
        mailer: config.mailer.clone(),
        cipher: Arc::new(cipher),
        clock,
    };
    let cookies = CookieSettings::from_policy(&config.policy, config.security.cookie_secure);
    Ok(HttpState::new(ports, config.policy, cookies))
}
