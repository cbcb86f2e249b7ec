//! Authentication use-cases.
//!
//! Drives the signup, email verification, login, device verification,
//! refresh and password reset flows over the persistence, expiring store,
//! hashing, token and mail ports. Intermediate state between steps lives in
//! the [`ExpiringStore`] under these keys:
//!
//! - `pending:registration:{email}`: [`PendingRegistration`]
//! - `challenge:device:{device_id}`: [`DeviceChallenge`]
//! - `reset:password:{email}`: [`PasswordReset`]
//!
//! Logs carry user ids only; codes, passwords and tokens never reach them.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use uuid::Uuid;

use super::ports::{
    AccessTokenCodec, DeviceRepository, ExpiringStore, ExpiringStoreError, MailMessage, Mailer,
    PasswordHasher, UserRepository,
};
use super::{
    AccessClaims, Actor, DeviceChallenge, DeviceContext, Email, Error, LoginCredentials,
    LoginOutcome, PasswordReset, PendingRegistration, RefreshOutcome, RefreshTokens,
    Registration, TokenPair, User, UserDevice, UserId, VerificationCode, validate_password,
};

const INVALID_CREDENTIALS: &str = "invalid credentials";
const INVALID_DEVICE_CODE: &str = "invalid or expired verification code";
const INVALID_RESET_CODE: &str = "invalid or expired reset code";

/// Lifetimes applied by the authentication flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Lifetime of verification, device and reset codes.
    pub code_ttl: Duration,
    /// Lifetime of signed access tokens.
    pub access_token_ttl: Duration,
    /// Lifetime of refresh tokens.
    pub refresh_token_ttl: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(600),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Driven ports required by [`AuthService`].
#[derive(Clone)]
pub struct AuthServicePorts {
    /// Account storage.
    pub users: Arc<dyn UserRepository>,
    /// Trusted device registry.
    pub devices: Arc<dyn DeviceRepository>,
    /// Short-lived state between steps.
    pub store: Arc<dyn ExpiringStore>,
    /// Password hashing.
    pub hasher: Arc<dyn PasswordHasher>,
    /// Access token signing.
    pub tokens: Arc<dyn AccessTokenCodec>,
    /// Code delivery.
    pub mailer: Arc<dyn Mailer>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    ports: AuthServicePorts,
    refresh_tokens: RefreshTokens,
    policy: AuthPolicy,
}

fn pending_key(email: &Email) -> String {
    format!("pending:registration:{email}")
}

fn challenge_key(device_id: Uuid) -> String {
    format!("challenge:device:{device_id}")
}

fn reset_key(email: &Email) -> String {
    format!("reset:password:{email}")
}

impl AuthService {
    /// Create the service.
    pub fn new(ports: AuthServicePorts, policy: AuthPolicy) -> Self {
        let refresh_tokens = RefreshTokens::new(ports.store.clone(), policy.refresh_token_ttl);
        Self {
            ports,
            refresh_tokens,
            policy,
        }
    }

    /// Lifetimes in force.
    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    /// Refresh token registry shared with the account services.
    pub fn refresh_tokens(&self) -> &RefreshTokens {
        &self.refresh_tokens
    }

    async fn store_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), Error> {
        let encoded = serde_json::to_string(value)
            .map_err(|err| ExpiringStoreError::serialization(err.to_string()))?;
        self.ports
            .store
            .put(key, &encoded, self.policy.code_ttl)
            .await?;
        Ok(())
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(raw) = self.ports.store.get(key).await? else {
            return Ok(None);
        };
        let decoded = serde_json::from_str(&raw)
            .map_err(|err| ExpiringStoreError::serialization(err.to_string()))?;
        Ok(Some(decoded))
    }

    async fn issue_tokens(&self, user: &User) -> Result<TokenPair, Error> {
        let lifetime = i64::try_from(self.policy.access_token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = AccessClaims::for_user(user, self.ports.clock.utc(), lifetime);
        let access_token = self.ports.tokens.encode(&claims)?;
        let refresh_token = self.refresh_tokens.issue(&user.id).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn record_login(&self, mut user: User) -> Result<User, Error> {
        user.last_login = Some(self.ports.clock.utc());
        self.ports.users.update(&user).await?;
        Ok(user)
    }

    /// Start a registration: hash the password, park the signup and mail a
    /// code.
    pub async fn signup(&self, registration: Registration) -> Result<(), Error> {
        let Registration {
            email,
            full_name,
            password,
            role,
        } = registration;
        if self.ports.users.find_by_email(&email).await?.is_some() {
            return Err(Error::invalid_request("email already registered"));
        }
        let key = pending_key(&email);
        if self.ports.store.get(&key).await?.is_some() {
            return Err(Error::invalid_request(
                "a verification is already pending for this email",
            ));
        }
        let password_hash = self.ports.hasher.hash(password.as_str())?;
        let code = VerificationCode::generate();
        let mail = MailMessage::email_verification(email.clone(), full_name.as_ref(), &code);
        let pending = PendingRegistration {
            email,
            full_name,
            password_hash,
            role,
            code,
        };
        self.store_json(&key, &pending).await?;
        self.ports.mailer.send(&mail).await?;
        info!(role = %pending.role, "registration pending email verification");
        Ok(())
    }

    /// Confirm a pending registration and create the account.
    pub async fn verify_email(&self, email: &Email, code: &str) -> Result<User, Error> {
        let key = pending_key(email);
        let Some(pending) = self.load_json::<PendingRegistration>(&key).await? else {
            return Err(Error::invalid_request(
                "no pending registration for this email",
            ));
        };
        if !pending.code.matches(code) {
            return Err(Error::invalid_request("invalid verification code"));
        }
        let user = User::register(
            pending.email,
            pending.full_name,
            pending.role,
            self.ports.clock.utc(),
        );
        self.ports
            .users
            .insert(&user, &pending.password_hash)
            .await?;
        self.ports.store.remove(&key).await?;
        info!(user_id = %user.id, "account created");
        Ok(user)
    }

    /// Mail a fresh code for a pending registration and restart its expiry.
    pub async fn resend_verification(&self, email: &Email) -> Result<(), Error> {
        let key = pending_key(email);
        let Some(mut pending) = self.load_json::<PendingRegistration>(&key).await? else {
            return Err(Error::invalid_request(
                "no pending registration for this email",
            ));
        };
        pending.code = VerificationCode::generate();
        self.store_json(&key, &pending).await?;
        let mail =
            MailMessage::email_verification(email.clone(), pending.full_name.as_ref(), &pending.code);
        self.ports.mailer.send(&mail).await?;
        Ok(())
    }

    /// Password login with device recognition.
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        context: &DeviceContext,
    ) -> Result<LoginOutcome, Error> {
        let Some(user) = self.ports.users.find_by_email(credentials.email()).await? else {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };
        let Some(hash) = self.ports.users.password_hash(&user.id).await? else {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };
        if !self.ports.hasher.verify(credentials.password(), &hash)? {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        }
        if !user.is_active {
            return Err(Error::forbidden("account disabled"));
        }
        if !user.is_verified {
            return Err(Error::forbidden("email not verified"));
        }

        let now = self.ports.clock.utc();
        let fingerprint = context.resolved_fingerprint();
        if let Some(device) = self
            .ports
            .devices
            .find_by_fingerprint(&user.id, &fingerprint)
            .await?
        {
            self.ports
                .devices
                .touch(device.id, now, context.ip_address.clone())
                .await?;
        } else if self.ports.devices.list_for_user(&user.id).await?.is_empty() {
            let device = UserDevice {
                id: Uuid::new_v4(),
                user_id: user.id,
                fingerprint,
                device_name: context.device_name.clone(),
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
                is_trusted: true,
                created_at: now,
                last_used_at: now,
            };
            self.ports.devices.insert(&device).await?;
            info!(user_id = %user.id, device_id = %device.id, "first device registered");
        } else {
            let challenge = DeviceChallenge {
                user_id: user.id,
                device_id: Uuid::new_v4(),
                fingerprint,
                device_name: context.device_name.clone(),
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
                code: VerificationCode::generate(),
            };
            self.store_json(&challenge_key(challenge.device_id), &challenge)
                .await?;
            let mail = MailMessage::device_verification(
                user.email.clone(),
                challenge.device_name.as_deref(),
                &challenge.code,
            );
            self.ports.mailer.send(&mail).await?;
            info!(user_id = %user.id, "device verification required");
            return Ok(LoginOutcome::DeviceVerificationRequired {
                device_id: challenge.device_id,
            });
        }

        let user = self.record_login(user).await?;
        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, "login succeeded");
        Ok(LoginOutcome::Authenticated { user, tokens })
    }

    /// Complete a device challenge and sign the user in.
    pub async fn verify_device(
        &self,
        email: &Email,
        device_id: Uuid,
        code: &str,
    ) -> Result<(User, TokenPair), Error> {
        let key = challenge_key(device_id);
        let Some(challenge) = self.load_json::<DeviceChallenge>(&key).await? else {
            return Err(Error::invalid_request(INVALID_DEVICE_CODE));
        };
        let user = self
            .ports
            .users
            .find_by_email(email)
            .await?
            .filter(|user| user.id == challenge.user_id)
            .ok_or_else(|| Error::invalid_request(INVALID_DEVICE_CODE))?;
        if !challenge.code.matches(code) {
            return Err(Error::invalid_request(INVALID_DEVICE_CODE));
        }
        if !user.is_active {
            return Err(Error::forbidden("account disabled"));
        }

        let now = self.ports.clock.utc();
        let device = UserDevice {
            id: challenge.device_id,
            user_id: user.id,
            fingerprint: challenge.fingerprint,
            device_name: challenge.device_name,
            ip_address: challenge.ip_address,
            user_agent: challenge.user_agent,
            is_trusted: true,
            created_at: now,
            last_used_at: now,
        };
        self.ports.devices.insert(&device).await?;
        self.ports.store.remove(&key).await?;
        let user = self.record_login(user).await?;
        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, device_id = %device.id, "device verified");
        Ok((user, tokens))
    }

    /// Resolve an access token to an active principal.
    pub async fn authenticate(&self, access_token: &str) -> Result<Actor, Error> {
        let claims = self.ports.tokens.decode(access_token)?;
        let user = self
            .ports
            .users
            .find_by_id(&claims.sub)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| Error::unauthorized("user not found or inactive"))?;
        Ok(Actor {
            user_id: user.id,
            role: user.role,
        })
    }

    /// Subject of a valid access token, whether or not the account is still
    /// active. Used to attribute requests that deactivate their caller.
    pub fn token_subject(&self, access_token: &str) -> Option<UserId> {
        self.ports
            .tokens
            .decode(access_token)
            .ok()
            .map(|claims| claims.sub)
    }

    /// Account of the authenticated caller.
    pub async fn current_user(&self, user_id: &UserId) -> Result<User, Error> {
        self.ports
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, Error> {
        let Some(user_id) = self.refresh_tokens.resolve(refresh_token).await? else {
            return Err(Error::unauthorized("invalid refresh token"));
        };
        let user = self
            .ports
            .users
            .find_by_id(&user_id)
            .await?
            .filter(|user| user.is_active);
        let Some(user) = user else {
            self.refresh_tokens.revoke(refresh_token).await?;
            info!(user_id = %user_id, "refresh token revoked for unavailable account");
            return Ok(RefreshOutcome::Revoked);
        };
        let lifetime = i64::try_from(self.policy.access_token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = AccessClaims::for_user(&user, self.ports.clock.utc(), lifetime);
        let access_token = self.ports.tokens.encode(&claims)?;
        Ok(RefreshOutcome::Refreshed { access_token })
    }

    /// Forget the presented refresh token, if any.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), Error> {
        if let Some(token) = refresh_token {
            self.refresh_tokens.revoke(token).await?;
        }
        Ok(())
    }

    /// Mail a reset code when the account exists. Silent otherwise.
    pub async fn forgot_password(&self, email: &Email) -> Result<(), Error> {
        let Some(user) = self.ports.users.find_by_email(email).await? else {
            return Ok(());
        };
        let reset = PasswordReset {
            user_id: user.id,
            code: VerificationCode::generate(),
        };
        self.store_json(&reset_key(email), &reset).await?;
        self.ports
            .mailer
            .send(&MailMessage::password_reset(email.clone(), &reset.code))
            .await?;
        info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    /// Set a new password with a mailed reset code and end every session.
    pub async fn reset_password(
        &self,
        email: &Email,
        code: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let key = reset_key(email);
        let Some(reset) = self.load_json::<PasswordReset>(&key).await? else {
            return Err(Error::invalid_request(INVALID_RESET_CODE));
        };
        if !reset.code.matches(code) {
            return Err(Error::invalid_request(INVALID_RESET_CODE));
        }
        validate_password(new_password)?;
        if self.ports.users.find_by_id(&reset.user_id).await?.is_none() {
            return Err(Error::not_found("user not found"));
        }
        let hash = self.ports.hasher.hash(new_password)?;
        self.ports
            .users
            .replace_password(&reset.user_id, &hash, self.ports.clock.utc())
            .await?;
        self.ports.store.remove(&key).await?;
        self.refresh_tokens.revoke_all(&reset.user_id).await?;
        info!(user_id = %reset.user_id, "password reset completed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "auth_service_tests.rs"]
mod tests;
