//! AES-256-GCM field encryption.
//!
//! Ciphertext is stored as standard base64 of `nonce || ciphertext`, with a
//! fresh 96-bit nonce per value.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use zeroize::Zeroizing;

use crate::domain::ports::{FieldCipher, FieldCipherError};

const NONCE_BYTES: usize = 12;
/// Required key length in bytes.
pub const KEY_BYTES: usize = 32;

/// [`FieldCipher`] backed by AES-256-GCM.
#[derive(Clone)]
pub struct AesGcmFieldCipher {
    cipher: Aes256Gcm,
}

impl AesGcmFieldCipher {
    /// Build a cipher from a 32-byte key.
    ///
    /// # Errors
    /// Returns [`FieldCipherError::Encrypt`] when the key has the wrong length.
    pub fn new(key: &Zeroizing<Vec<u8>>) -> Result<Self, FieldCipherError> {
        if key.len() != KEY_BYTES {
            return Err(FieldCipherError::encrypt(format!(
                "encryption key must be {KEY_BYTES} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|err| FieldCipherError::encrypt(err.to_string()))?;
        Ok(Self { cipher })
    }
}

impl FieldCipher for AesGcmFieldCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, FieldCipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|err| FieldCipherError::encrypt(err.to_string()))?;
        let mut packed = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(packed))
    }

    fn decrypt(&self, encoded: &str) -> Result<String, FieldCipherError> {
        let packed = STANDARD
            .decode(encoded)
            .map_err(|err| FieldCipherError::decrypt(err.to_string()))?;
        if packed.len() <= NONCE_BYTES {
            return Err(FieldCipherError::decrypt("ciphertext too short"));
        }
        let (nonce, ciphertext) = packed.split_at(NONCE_BYTES);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|err| FieldCipherError::decrypt(err.to_string()))?;
        String::from_utf8(plaintext).map_err(|err| FieldCipherError::decrypt(err.to_string()))
    }
}
