//! User identity, contact and role primitives.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum stored length of an email address.
pub const EMAIL_MAX: usize = 255;
/// Maximum length of a user's full name.
pub const FULL_NAME_MAX: usize = 255;
/// Minimum password length in characters.
pub const PASSWORD_MIN: usize = 8;
/// Maximum password length in characters.
pub const PASSWORD_MAX: usize = 128;

/// Validation errors raised by user primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    /// The identifier is not a UUID.
    #[error("user id must be a valid UUID")]
    InvalidId,
    /// The email address is malformed.
    #[error("email must be a valid address")]
    InvalidEmail,
    /// The email address is longer than [`EMAIL_MAX`].
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// The full name is blank.
    #[error("full name must not be empty")]
    EmptyFullName,
    /// The full name is longer than [`FULL_NAME_MAX`].
    #[error("full name must be at most {max} characters")]
    FullNameTooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// The password is shorter than [`PASSWORD_MIN`].
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum accepted length.
        min: usize,
    },
    /// The password is longer than [`PASSWORD_MAX`].
    #[error("password must be at most {max} characters")]
    PasswordTooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// The role name is not recognised.
    #[error("role must be one of patient, doctor, admin, staff")]
    UnknownRole,
}

/// Stable user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Parse a [`UserId`] from its string form.
    ///
    /// # Errors
    /// Returns [`UserValidationError::InvalidId`] when the input is not a UUID.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let raw = id.as_ref();
        if raw.trim() != raw {
            return Err(UserValidationError::InvalidId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId)
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Normalised email address.
///
/// ## Invariants
/// - trimmed and lower-cased;
/// - exactly one `@`, a non-empty local part, and a domain containing a `.`
///   that neither starts nor ends the domain;
/// - at most [`EMAIL_MAX`] characters.
///
/// # Examples
/// ```
/// use medisecure::domain::Email;
///
/// let email = Email::parse("  Ada@Example.COM ").expect("valid email");
/// assert_eq!(email.as_ref(), "ada@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and normalise an email address.
    ///
    /// # Errors
    /// Returns [`UserValidationError::InvalidEmail`] or
    /// [`UserValidationError::EmailTooLong`].
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let normalised = raw.as_ref().trim().to_lowercase();
        if normalised.chars().count() > EMAIL_MAX {
            return Err(UserValidationError::EmailTooLong { max: EMAIL_MAX });
        }
        let Some((local, domain)) = normalised.split_once('@') else {
            return Err(UserValidationError::InvalidEmail);
        };
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@');
        if local.is_empty() || !domain_ok || normalised.chars().any(char::is_whitespace) {
            return Err(UserValidationError::InvalidEmail);
        }
        Ok(Self(normalised))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Trimmed, non-empty full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FullName(String);

impl FullName {
    /// Validate a full name.
    ///
    /// # Errors
    /// Returns [`UserValidationError::EmptyFullName`] or
    /// [`UserValidationError::FullNameTooLong`].
    pub fn new(raw: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(UserValidationError::EmptyFullName);
        }
        if trimmed.chars().count() > FULL_NAME_MAX {
            return Err(UserValidationError::FullNameTooLong { max: FULL_NAME_MAX });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for FullName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<FullName> for String {
    fn from(value: FullName) -> Self {
        value.0
    }
}

impl TryFrom<String> for FullName {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Check a candidate password against the length policy.
///
/// # Errors
/// Returns [`UserValidationError::PasswordTooShort`] or
/// [`UserValidationError::PasswordTooLong`].
pub fn validate_password(candidate: &str) -> Result<(), UserValidationError> {
    let length = candidate.chars().count();
    if length < PASSWORD_MIN {
        return Err(UserValidationError::PasswordTooShort { min: PASSWORD_MIN });
    }
    if length > PASSWORD_MAX {
        return Err(UserValidationError::PasswordTooLong { max: PASSWORD_MAX });
    }
    Ok(())
}

/// Access role assigned to an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Default role for self-registered accounts.
    #[default]
    Patient,
    /// Clinician able to prescribe and run appointments.
    Doctor,
    /// Full administrative access.
    Admin,
    /// Front-desk and billing staff.
    Staff,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Patient, Role::Doctor, Role::Admin, Role::Staff];

    /// Stable wire and storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }

    /// Whether this role may manage invoices.
    pub const fn handles_billing(self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UserValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "doctor" => Ok(Self::Doctor),
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            _ => Err(UserValidationError::UnknownRole),
        }
    }
}

/// Registered account.
///
/// ## Invariants
/// - `email` is unique across users.
/// - Deleted accounts are kept with `is_active == false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Login and contact address.
    pub email: Email,
    /// Display name.
    pub full_name: FullName,
    /// Access role.
    pub role: Role,
    /// Whether the email address has been confirmed.
    pub is_verified: bool,
    /// Whether the account may sign in.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Most recent successful login.
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Build a freshly verified, active account.
    pub fn register(email: Email, full_name: FullName, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::random(),
            email,
            full_name,
            role,
            is_verified: true,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }
}

impl From<UserValidationError> for super::Error {
    fn from(err: UserValidationError) -> Self {
        super::Error::invalid_request(err.to_string())
    }
}
