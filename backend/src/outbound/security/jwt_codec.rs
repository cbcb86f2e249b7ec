//! HS256 JSON Web Token codec for access tokens.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mockable::Clock;
use zeroize::Zeroizing;

use crate::domain::AccessClaims;
use crate::domain::ports::{AccessTokenCodec, AccessTokenError};

/// [`AccessTokenCodec`] signing with a shared secret.
///
/// Expiry is checked against the injected clock rather than the wall clock
/// so that tests can move time.
pub struct JwtAccessTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl JwtAccessTokenCodec {
    /// Build a codec from the signing secret.
    pub fn new(secret: &Zeroizing<Vec<u8>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            clock,
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }
}

impl AccessTokenCodec for JwtAccessTokenCodec {
    fn encode(&self, claims: &AccessClaims) -> Result<String, AccessTokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| AccessTokenError::encoding(err.to_string()))
    }

    fn decode(&self, token: &str) -> Result<AccessClaims, AccessTokenError> {
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &Self::validation())
            .map_err(|_| AccessTokenError::invalid())?;
        if data.claims.exp <= self.clock.utc().timestamp() {
            return Err(AccessTokenError::expired());
        }
        Ok(data.claims)
    }
}
