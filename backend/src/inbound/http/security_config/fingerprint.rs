//! Signing secret fingerprinting for operational visibility.
//!
//! Provides a truncated SHA-256 fingerprint of the token signing secret so
//! operators can tell which secret is active without exposing the material
//! itself. The fingerprint is logged on startup.

use sha2::{Digest, Sha256};

/// Length of the fingerprint in bytes before hex encoding.
const FINGERPRINT_BYTES: usize = 8;

/// Generate a truncated SHA-256 fingerprint of secret material.
///
/// Returns the first 8 bytes of the SHA-256 hash as a 16-character hex string.
///
/// # Examples
///
/// ```rust
/// use medisecure::inbound::http::security_config::fingerprint::secret_fingerprint;
///
/// let fp = secret_fingerprint(&[7_u8; 64]);
///
/// assert_eq!(fp.len(), 16);
/// assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[must_use]
pub fn secret_fingerprint(secret: &[u8]) -> String {
    let digest = Sha256::digest(secret);
    hex::encode(&digest[..FINGERPRINT_BYTES])
}
