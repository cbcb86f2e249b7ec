//! Port for encrypting sensitive columns at rest.
use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors raised by field cipher adapters.
    pub enum FieldCipherError {
        /// Encryption failed.
        Encrypt { message: String } => "field encryption failed: {message}",
        /// The stored value is not valid ciphertext for the configured key.
        Decrypt { message: String } => "field decryption failed: {message}",
    }
}

impl From<FieldCipherError> for Error {
    fn from(err: FieldCipherError) -> Self {
        Error::internal(err.to_string())
    }
}

/// Authenticated symmetric encryption of text fields.
///
/// Each call to [`FieldCipher::encrypt`] uses a fresh nonce, so equal
/// plaintexts produce different ciphertexts.
#[cfg_attr(test, mockall::automock)]
pub trait FieldCipher: Send + Sync {
    /// Encrypt `plaintext` into a printable string.
    fn encrypt(&self, plaintext: &str) -> Result<String, FieldCipherError>;

    /// Reverse [`FieldCipher::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String, FieldCipherError>;
}
