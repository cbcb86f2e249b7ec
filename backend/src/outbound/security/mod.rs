//! Cryptographic adapters: password hashing, token signing and field
//! encryption.

mod aes_gcm_cipher;
mod argon2_hasher;
mod jwt_codec;

pub use aes_gcm_cipher::{AesGcmFieldCipher, KEY_BYTES as FIELD_KEY_BYTES};
pub use argon2_hasher::Argon2PasswordHasher;
pub use jwt_codec::JwtAccessTokenCodec;
