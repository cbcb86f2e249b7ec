//! Test utilities for the backend crate.
//!
//! This module provides shared helpers for both unit tests (in `src/`) and
//! integration tests (in `tests/`). It is only compiled when running tests or
//! with the `test-support` feature.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use sha2::{Digest, Sha256};

use crate::domain::ports::{MailMessage, Mailer, MailerError, PasswordHashError, PasswordHasher};

/// Fixed instant most suites start from.
///
/// # Panics
/// Never in practice; the literal is a valid timestamp.
pub fn fixture_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2031, 3, 10, 9, 0, 0).single() {
        Some(now) => now,
        None => panic!("fixture timestamp must be valid"),
    }
}

/// Clock tests can move forward.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move time forward by `seconds`.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock_clock() = instant;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Mailer capturing every message for inspection.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    /// Messages sent so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Six-digit code in the most recent message to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|message| message.to.as_ref() == to)
            .and_then(|message| extract_code(&message.body))
    }
}

fn extract_code(body: &str) -> Option<String> {
    body.split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() == crate::domain::auth::CODE_DIGITS)
        .map(str::to_owned)
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Unsalted SHA-256 hasher so suites avoid Argon2's cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastPasswordHasher;

impl FastPasswordHasher {
    const PREFIX: &'static str = "sha256$";
}

impl PasswordHasher for FastPasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        Ok(format!(
            "{}{}",
            Self::PREFIX,
            hex::encode(Sha256::digest(password.as_bytes()))
        ))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHashError> {
        if !hash.starts_with(Self::PREFIX) {
            return Err(PasswordHashError::malformed_hash("missing prefix"));
        }
        Ok(self.hash(password)? == hash)
    }
}

pub mod http;

pub mod openapi {
    //! OpenAPI schema traversal helpers.
    //!
    //! Provides utilities for extracting and inspecting utoipa `Schema` types,
    //! resolving `RefOr<Schema>` wrappers to concrete `Object` schemas with
    //! diagnostic error messages on type mismatches.

    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::{Object, Schema};

    /// Extract an `Object` schema, panicking with a diagnostic if not an Object.
    ///
    /// # Panics
    /// When `schema` is a reference, a combinator or a non-object type.
    pub fn unwrap_object_schema<'a>(schema: &'a RefOr<Schema>, name: &str) -> &'a Object {
        match schema {
            RefOr::T(Schema::Object(obj)) => obj,
            RefOr::Ref(reference) => {
                panic!(
                    "schema '{name}' is a $ref to '{}'; resolve the reference first",
                    reference.ref_location
                );
            }
            RefOr::T(Schema::AllOf(_)) => {
                panic!("schema '{name}' is an AllOf combinator; inspect composed schemas");
            }
            RefOr::T(Schema::Array(_)) => {
                panic!("schema '{name}' is an Array, not an Object");
            }
            _ => panic!("schema '{name}' has unexpected type"),
        }
    }

    /// Whether an Object schema declares `field`.
    pub fn has_property(obj: &Object, field: &str) -> bool {
        obj.properties.contains_key(field)
    }
}
