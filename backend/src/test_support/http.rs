//! In-memory wiring for HTTP handler and end-to-end tests.

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header::{AUTHORIZATION, HeaderName};
use actix_web::{test, web};
use serde_json::Value;
use chrono::TimeDelta;
use mockable::Clock;
use zeroize::Zeroizing;

use crate::domain::ports::{AccessTokenCodec, PasswordHasher, UserRepository};
use crate::domain::{AccessClaims, AuthPolicy, Email, FullName, Role, User};
use crate::inbound::http::cookies::CookieSettings;
use crate::inbound::http::state::{HttpState, HttpStatePorts};
use crate::outbound::memory::{
    InMemoryAppointmentRepository, InMemoryAuditLogRepository, InMemoryDeviceRepository,
    InMemoryExpiringStore, InMemoryInvoiceRepository, InMemoryMessageRepository,
    InMemoryPrescriptionRepository, InMemoryProfileRepository, InMemoryUserRepository,
};
use crate::outbound::security::{AesGcmFieldCipher, FIELD_KEY_BYTES, JwtAccessTokenCodec};

use super::{FastPasswordHasher, MutableClock, RecordingMailer, fixture_now};

/// Password every seeded account signs in with.
pub const TEST_PASSWORD: &str = "Correct-Horse-42";

/// Fully wired [`HttpState`] plus handles on the doubles behind it.
pub struct TestHarness {
    pub state: HttpState,
    pub clock: Arc<MutableClock>,
    pub mailer: Arc<RecordingMailer>,
    pub users: Arc<InMemoryUserRepository>,
    pub audit_logs: Arc<InMemoryAuditLogRepository>,
    tokens: Arc<JwtAccessTokenCodec>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Harness whose clock starts at [`fixture_now`]. Cookies are not
    /// `Secure` so plain-HTTP test requests carry them.
    ///
    /// # Panics
    /// Never in practice; the fixed cipher key has the right length.
    pub fn new() -> Self {
        let clock = Arc::new(MutableClock::new(fixture_now()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let mailer = Arc::new(RecordingMailer::default());
        let users = Arc::new(InMemoryUserRepository::default());
        let audit_logs = Arc::new(InMemoryAuditLogRepository::default());
        let secret = Zeroizing::new(vec![0x5a_u8; 64]);
        let tokens = Arc::new(JwtAccessTokenCodec::new(&secret, dyn_clock.clone()));
        let cipher = match AesGcmFieldCipher::new(&Zeroizing::new(vec![0x11; FIELD_KEY_BYTES])) {
            Ok(cipher) => cipher,
            Err(err) => panic!("test cipher key rejected: {err}"),
        };
        let policy = AuthPolicy::default();
        let ports = HttpStatePorts {
            users: users.clone(),
            devices: Arc::new(InMemoryDeviceRepository::default()),
            profiles: Arc::new(InMemoryProfileRepository::default()),
            appointments: Arc::new(InMemoryAppointmentRepository::default()),
            prescriptions: Arc::new(InMemoryPrescriptionRepository::default()),
            messages: Arc::new(InMemoryMessageRepository::default()),
            invoices: Arc::new(InMemoryInvoiceRepository::default()),
            audit_logs: audit_logs.clone(),
            store: Arc::new(InMemoryExpiringStore::with_clock(dyn_clock.clone())),
            hasher: Arc::new(FastPasswordHasher),
            tokens: tokens.clone(),
            mailer: mailer.clone(),
            cipher: Arc::new(cipher),
            clock: dyn_clock,
        };
        let state = HttpState::new(ports, policy, CookieSettings::from_policy(&policy, false));
        Self {
            state,
            clock,
            mailer,
            users,
            audit_logs,
            tokens,
        }
    }

    /// Insert a verified, active account signing in with [`TEST_PASSWORD`].
    ///
    /// # Panics
    /// When `email` is malformed or already taken.
    pub async fn seed_user(&self, email: &str, full_name: &str, role: Role) -> User {
        let email = match Email::parse(email) {
            Ok(email) => email,
            Err(err) => panic!("seed email {email} rejected: {err}"),
        };
        let full_name = match FullName::new(full_name) {
            Ok(name) => name,
            Err(err) => panic!("seed name rejected: {err}"),
        };
        let mut user = User::register(email, full_name, role, self.clock.utc());
        user.is_verified = true;
        let hash = match FastPasswordHasher.hash(TEST_PASSWORD) {
            Ok(hash) => hash,
            Err(err) => panic!("hashing seed password failed: {err}"),
        };
        if let Err(err) = self.users.insert(&user, &hash).await {
            panic!("seeding {} failed: {err}", user.email);
        }
        user
    }

    /// Signed access token for `user`, valid for fifteen minutes.
    ///
    /// # Panics
    /// When signing fails.
    pub fn access_token_for(&self, user: &User) -> String {
        let lifetime = TimeDelta::minutes(15).num_seconds();
        let claims = AccessClaims::for_user(user, self.clock.utc(), lifetime);
        match self.tokens.encode(&claims) {
            Ok(token) => token,
            Err(err) => panic!("signing test token failed: {err}"),
        }
    }

    /// Seed an account and return it with a bearer token.
    pub async fn seed_with_token(&self, email: &str, role: Role) -> (User, String) {
        let user = self.seed_user(email, "Test Account", role).await;
        let token = self.access_token_for(&user);
        (user, token)
    }

    /// Shared state ready for `App::app_data`.
    pub fn data(&self) -> web::Data<HttpState> {
        web::Data::new(self.state.clone())
    }
}

/// `Authorization: Bearer` header for `token`.
pub fn bearer(token: &str) -> (HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

/// Dispatch `request` and decode the JSON body; an empty body reads as
/// `Value::Null`.
///
/// # Panics
/// When the body is not JSON.
pub async fn send_json<S, R, B>(app: &S, request: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(app, request).await;
    let status = response.status();
    let body = test::read_body(response).await;
    if body.is_empty() {
        return (status, Value::Null);
    }
    match serde_json::from_slice(&body) {
        Ok(value) => (status, value),
        Err(err) => panic!("response body is not JSON ({err}): {body:?}"),
    }
}
