//! Security material loading and validation.
//!
//! Signing secrets, the field encryption key and the cookie `Secure` toggle
//! are read through [`mockable::Env`] so they are validated consistently and
//! can be tested in isolation. Release builds fail fast on missing or invalid
//! values; debug builds warn and fall back to safe defaults.

use std::fmt;
use std::path::PathBuf;

use mockable::Env;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::warn;
use zeroize::Zeroizing;

use crate::outbound::security::FIELD_KEY_BYTES;

pub mod fingerprint;
mod parsing;

use parsing::{BoolEnvConfig, parse_bool_env};

const JWT_SECRET_DEFAULT_PATH: &str = "/var/run/secrets/jwt_secret";
const FIELD_KEY_DEFAULT_PATH: &str = "/var/run/secrets/field_encryption_key";
const JWT_SECRET_MIN_LEN: usize = 32;
const EPHEMERAL_SECRET_LEN: usize = 64;
/// Path to the access token signing secret.
pub const JWT_SECRET_FILE_ENV: &str = "JWT_SECRET_FILE";
/// Path to the AES-256 field encryption key.
pub const FIELD_KEY_FILE_ENV: &str = "FIELD_ENCRYPTION_KEY_FILE";
/// Toggle for the `Secure` cookie attribute.
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
/// Permit random per-process secrets outside debug builds.
pub const ALLOW_EPHEMERAL_ENV: &str = "AUTH_ALLOW_EPHEMERAL";
const FIELD_KEY_EXPECTED: &str = "32 raw bytes or 64 hex characters";

/// Build mode for security configuration validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate defaults and emit warnings for missing toggles.
    Debug,
    /// Release builds require explicit, valid security material.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use medisecure::inbound::http::security_config::BuildMode;
    ///
    /// let mode = BuildMode::from_debug_assertions();
    /// if cfg!(debug_assertions) {
    ///     assert_eq!(mode, BuildMode::Debug);
    /// } else {
    ///     assert_eq!(mode, BuildMode::Release);
    /// }
    /// ```
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Security material derived from the environment.
pub struct SecuritySettings {
    /// HMAC secret used to sign access tokens.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    /// AES-256 key protecting profile fields and message bodies.
    pub field_key: Zeroizing<Vec<u8>>,
    /// Whether auth cookies are marked `Secure`.
    pub cookie_secure: bool,
    /// Whether either secret was generated for this process only.
    pub ephemeral: bool,
}

impl fmt::Debug for SecuritySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecuritySettings")
            .field("jwt_secret", &"<redacted>")
            .field("field_key", &"<redacted>")
            .field("cookie_secure", &self.cookie_secure)
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

/// Errors raised while validating security configuration.
#[derive(thiserror::Error, Debug)]
pub enum SecurityConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {name}")]
    MissingEnv { name: &'static str },
    /// A variable is present but contains an invalid value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Reading a secret file failed.
    #[error("failed to read secret at {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The signing secret is too short for release builds.
    #[error("signing secret at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
    /// The field encryption key has the wrong shape.
    #[error("field encryption key at {path} is malformed; expected {expected}")]
    MalformedFieldKey {
        path: PathBuf,
        expected: &'static str,
    },
}

/// Build security settings from environment variables and build mode.
///
/// # Examples
///
/// ```rust
/// use medisecure::inbound::http::security_config::{
///     security_settings_from_env, BuildMode,
/// };
/// use mockable::MockEnv;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = std::env::temp_dir();
/// let jwt_path = dir.join("jwt_secret_example");
/// let key_path = dir.join("field_key_example");
/// std::fs::write(&jwt_path, vec![b'a'; 64])?;
/// std::fs::write(&key_path, "00".repeat(32))?;
///
/// let jwt_path = jwt_path.to_string_lossy().into_owned();
/// let key_path_str = key_path.to_string_lossy().into_owned();
/// let mut env = MockEnv::new();
/// env.expect_string()
///     .returning(move |name| match name {
///         "JWT_SECRET_FILE" => Some(jwt_path.clone()),
///         "FIELD_ENCRYPTION_KEY_FILE" => Some(key_path_str.clone()),
///         "COOKIE_SECURE" => Some("1".to_string()),
///         _ => None,
///     });
///
/// let settings = security_settings_from_env(&env, BuildMode::Release)?;
/// assert!(settings.cookie_secure);
/// assert_eq!(settings.field_key.len(), 32);
///
/// std::fs::remove_file(dir.join("jwt_secret_example"))?;
/// std::fs::remove_file(&key_path)?;
/// # Ok(())
/// # }
/// ```
pub fn security_settings_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<SecuritySettings, SecurityConfigError> {
    let cookie_secure = parse_bool_env(
        env,
        mode,
        BoolEnvConfig::new(COOKIE_SECURE_ENV, true).required_in_release(),
    )?;
    let allow_ephemeral = parse_bool_env(env, mode, BoolEnvConfig::new(ALLOW_EPHEMERAL_ENV, false))?;
    let fallback_allowed = mode.is_debug() || allow_ephemeral;

    let (jwt_secret, jwt_ephemeral) = jwt_secret_from_env(env, mode, fallback_allowed)?;
    let (field_key, key_ephemeral) = field_key_from_env(env, fallback_allowed)?;

    Ok(SecuritySettings {
        jwt_secret,
        field_key,
        cookie_secure,
        ephemeral: jwt_ephemeral || key_ephemeral,
    })
}

fn secret_path<E: Env>(env: &E, name: &'static str, default: &str) -> PathBuf {
    PathBuf::from(env.string(name).unwrap_or_else(|| default.to_owned()))
}

fn random_secret(len: usize) -> Zeroizing<Vec<u8>> {
    let mut bytes = Zeroizing::new(vec![0_u8; len]);
    OsRng.fill_bytes(bytes.as_mut_slice());
    bytes
}

fn jwt_secret_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
    fallback_allowed: bool,
) -> Result<(Zeroizing<Vec<u8>>, bool), SecurityConfigError> {
    let path = secret_path(env, JWT_SECRET_FILE_ENV, JWT_SECRET_DEFAULT_PATH);
    match std::fs::read(&path) {
        Ok(bytes) => {
            let bytes = Zeroizing::new(bytes);
            let length = bytes.len();
            if length < JWT_SECRET_MIN_LEN {
                if mode == BuildMode::Release {
                    return Err(SecurityConfigError::KeyTooShort {
                        path,
                        length,
                        min_len: JWT_SECRET_MIN_LEN,
                    });
                }
                warn!(
                    path = %path.display(),
                    length,
                    "signing secret shorter than {JWT_SECRET_MIN_LEN} bytes (dev only)"
                );
            }
            Ok((bytes, false))
        }
        Err(error) if fallback_allowed => {
            warn!(
                path = %path.display(),
                error = %error,
                "using temporary signing secret; tokens will not survive a restart"
            );
            Ok((random_secret(EPHEMERAL_SECRET_LEN), true))
        }
        Err(error) => Err(SecurityConfigError::KeyRead {
            path,
            source: error,
        }),
    }
}

fn field_key_from_env<E: Env>(
    env: &E,
    fallback_allowed: bool,
) -> Result<(Zeroizing<Vec<u8>>, bool), SecurityConfigError> {
    let path = secret_path(env, FIELD_KEY_FILE_ENV, FIELD_KEY_DEFAULT_PATH);
    let raw = match std::fs::read(&path) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(error) if fallback_allowed => {
            warn!(
                path = %path.display(),
                error = %error,
                "using temporary field encryption key; encrypted data will be unreadable after a restart"
            );
            return Ok((random_secret(FIELD_KEY_BYTES), true));
        }
        Err(error) => {
            return Err(SecurityConfigError::KeyRead {
                path,
                source: error,
            });
        }
    };

    match decode_field_key(&raw) {
        Some(key) => Ok((key, false)),
        None if fallback_allowed => {
            warn!(
                path = %path.display(),
                "malformed field encryption key; using a temporary key (dev only)"
            );
            Ok((random_secret(FIELD_KEY_BYTES), true))
        }
        None => Err(SecurityConfigError::MalformedFieldKey {
            path,
            expected: FIELD_KEY_EXPECTED,
        }),
    }
}

/// Accept exactly 32 raw bytes, or 64 hex characters with optional
/// surrounding whitespace.
fn decode_field_key(raw: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    if raw.len() == FIELD_KEY_BYTES {
        return Some(Zeroizing::new(raw.to_vec()));
    }
    let text = std::str::from_utf8(raw).ok()?.trim();
    if text.len() != FIELD_KEY_BYTES * 2 {
        return None;
    }
    hex::decode(text).ok().map(Zeroizing::new)
}

#[cfg(test)]
mod tests;
