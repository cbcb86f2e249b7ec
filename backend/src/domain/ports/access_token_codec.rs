//! Port for signing and verifying access tokens.
use crate::domain::{AccessClaims, Error};

use super::define_port_error;

define_port_error! {
    /// Errors raised by access token codecs.
    pub enum AccessTokenError {
        /// The token is malformed or its signature does not verify.
        Invalid => "access token is invalid",
        /// The token verified but is past its expiry.
        Expired => "access token has expired",
        /// Signing failed.
        Encoding { message: String } => "access token encoding failed: {message}",
    }
}

impl From<AccessTokenError> for Error {
    fn from(err: AccessTokenError) -> Self {
        match err {
            AccessTokenError::Invalid => Error::unauthorized("invalid token"),
            AccessTokenError::Expired => Error::unauthorized("token expired"),
            AccessTokenError::Encoding { message } => {
                Error::internal(format!("token encoding failed: {message}"))
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait AccessTokenCodec: Send + Sync {
    /// Sign `claims`.
    fn encode(&self, claims: &AccessClaims) -> Result<String, AccessTokenError>;

    /// Verify a token's signature and expiry and return its claims.
    fn decode(&self, token: &str) -> Result<AccessClaims, AccessTokenError>;
}
