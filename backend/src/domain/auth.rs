//! Authentication primitives: credentials, one-time codes, token claims and
//! the records kept in the expiring store between authentication steps.
//!
//! Keep inbound payload parsing outside the domain by exposing constructors
//! that validate string inputs before a handler talks to a service.

use std::fmt;

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{Email, Error, FullName, Role, User, UserId, UserValidationError, validate_password};

/// Number of digits in a verification code.
pub const CODE_DIGITS: usize = 6;

/// Domain error returned when login payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginValidationError {
    /// Email was malformed.
    InvalidEmail,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for LoginValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "email must be a valid address"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for LoginValidationError {}

/// Validated login credentials used by the authentication service.
///
/// ## Invariants
/// - `email` is normalised by [`Email::parse`].
/// - `password` is non-empty and wiped from memory on drop.
///
/// # Examples
/// ```
/// use medisecure::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("Ada@example.com", "s3cret-pass").unwrap();
/// assert_eq!(creds.email().as_ref(), "ada@example.com");
/// assert_eq!(creds.password(), "s3cret-pass");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    email: Email,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw email/password inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, LoginValidationError> {
        let email = Email::parse(email).map_err(|_| LoginValidationError::InvalidEmail)?;
        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Normalised email used for the account lookup.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

/// Validated signup request.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Address the verification code is sent to.
    pub email: Email,
    /// Display name for the new account.
    pub full_name: FullName,
    /// Plaintext password, hashed before it is stored anywhere.
    pub password: Zeroizing<String>,
    /// Requested role; defaults to patient.
    pub role: Role,
}

impl Registration {
    /// Validate raw signup fields.
    ///
    /// # Errors
    /// Returns the first [`UserValidationError`] encountered.
    pub fn try_from_parts(
        email: &str,
        password: &str,
        full_name: &str,
        role: Option<Role>,
    ) -> Result<Self, UserValidationError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let full_name = FullName::new(full_name)?;
        Ok(Self {
            email,
            full_name,
            password: Zeroizing::new(password.to_owned()),
            role: role.unwrap_or_default(),
        })
    }
}

/// Six-digit one-time code.
///
/// Codes are drawn from the operating system CSPRNG and compared in constant
/// time.
///
/// # Examples
/// ```
/// use medisecure::domain::VerificationCode;
///
/// let code = VerificationCode::generate();
/// assert_eq!(code.as_str().len(), 6);
/// assert!(code.matches(code.as_str()));
/// assert!(!code.matches("not-it"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Draw a fresh code.
    pub fn generate() -> Self {
        let value: u32 = OsRng.gen_range(0..1_000_000);
        Self(format!("{value:0width$}", width = CODE_DIGITS))
    }

    /// Compare a caller-supplied code without leaking timing information.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.trim().as_bytes())
    }

    /// Code digits, for delivery by mail.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode(******)")
    }
}

#[cfg(test)]
impl VerificationCode {
    pub(crate) fn from_digits(digits: &str) -> Self {
        Self(digits.to_owned())
    }
}

/// Signup awaiting email confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    /// Normalised email address.
    pub email: Email,
    /// Display name for the new account.
    pub full_name: FullName,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Requested role.
    pub role: Role,
    /// Code sent by mail.
    pub code: VerificationCode,
}

/// Login attempt from an unrecognised device awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceChallenge {
    /// Account the challenge belongs to.
    pub user_id: UserId,
    /// Identifier the device receives once confirmed.
    pub device_id: Uuid,
    /// Device fingerprint observed at login.
    pub fingerprint: String,
    /// Optional human-readable name.
    pub device_name: Option<String>,
    /// Client IP observed at login.
    pub ip_address: Option<String>,
    /// Client user agent observed at login.
    pub user_agent: Option<String>,
    /// Code sent by mail.
    pub code: VerificationCode,
}

/// Outstanding password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    /// Account being reset.
    pub user_id: UserId,
    /// Code sent by mail.
    pub code: VerificationCode,
}

/// Client context observed on a login request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceContext {
    /// Fingerprint supplied by the client, if any.
    pub fingerprint: Option<String>,
    /// Optional human-readable device name.
    pub device_name: Option<String>,
    /// Peer address.
    pub ip_address: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

impl DeviceContext {
    /// Fingerprint for device recognition.
    ///
    /// Uses the client-supplied value when present, otherwise the SHA-256 hex
    /// digest of `user_agent + ip`.
    ///
    /// # Examples
    /// ```
    /// use medisecure::domain::DeviceContext;
    ///
    /// let ctx = DeviceContext {
    ///     fingerprint: Some("browser-42".into()),
    ///     ..DeviceContext::default()
    /// };
    /// assert_eq!(ctx.resolved_fingerprint(), "browser-42");
    /// ```
    pub fn resolved_fingerprint(&self) -> String {
        if let Some(supplied) = self
            .fingerprint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return supplied.to_owned();
        }
        let mut hasher = Sha256::new();
        hasher.update(self.user_agent.as_deref().unwrap_or_default().as_bytes());
        hasher.update(self.ip_address.as_deref().unwrap_or_default().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user id.
    pub sub: UserId,
    /// Role at issuance.
    pub role: Role,
    /// Email at issuance.
    pub email: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl AccessClaims {
    /// Claims for `user` valid from `now` for `lifetime_secs`.
    pub fn for_user(user: &User, now: DateTime<Utc>, lifetime_secs: i64) -> Self {
        let iat = now.timestamp();
        Self {
            sub: user.id,
            role: user.role,
            email: user.email.to_string(),
            iat,
            exp: iat.saturating_add(lifetime_secs),
        }
    }
}

/// Tokens handed to a client after a successful authentication step.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Signed JWT.
    pub access_token: String,
    /// Opaque refresh token.
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Result of a password login.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Credentials accepted on a trusted device.
    Authenticated {
        /// The signed-in account.
        user: User,
        /// Fresh tokens.
        tokens: TokenPair,
    },
    /// The device is unknown; a code has been mailed.
    DeviceVerificationRequired {
        /// Identifier to echo back when verifying the device.
        device_id: Uuid,
    },
}

/// Result of exchanging a refresh token.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new access token was issued.
    Refreshed {
        /// Signed JWT.
        access_token: String,
    },
    /// The owning account is gone or disabled; the client must sign in again.
    Revoked,
}

/// Authenticated principal attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Caller's id.
    pub user_id: UserId,
    /// Caller's current role.
    pub role: Role,
}

impl Actor {
    /// Whether the caller is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require one of the listed roles.
    ///
    /// # Errors
    /// Returns a forbidden error naming the required roles.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), Error> {
        if roles.contains(&self.role) {
            return Ok(());
        }
        let names: Vec<&str> = roles.iter().map(|role| role.as_str()).collect();
        Err(Error::forbidden(format!(
            "requires role: {}",
            names.join(" or ")
        )))
    }
}
