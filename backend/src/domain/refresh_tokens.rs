//! Server-side refresh token registry.
//!
//! Tokens are opaque 32-byte random strings. Only their SHA-256 digest is
//! stored, keyed as `refresh:token:{digest}` and mapped to the owning user.
//! A per-user set `refresh:user:{id}` indexes live digests so every session
//! of an account can be revoked at once.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::ports::ExpiringStore;
use super::{Error, UserId};

const TOKEN_BYTES: usize = 32;

fn token_key(digest: &str) -> String {
    format!("refresh:token:{digest}")
}

fn user_key(user_id: &UserId) -> String {
    format!("refresh:user:{user_id}")
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issues, resolves and revokes refresh tokens.
#[derive(Clone)]
pub struct RefreshTokens {
    store: Arc<dyn ExpiringStore>,
    ttl: Duration,
}

impl RefreshTokens {
    /// Create a registry whose tokens live for `ttl`.
    pub fn new(store: Arc<dyn ExpiringStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `user_id`.
    pub async fn issue(&self, user_id: &UserId) -> Result<String, Error> {
        let mut bytes = [0_u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let hashed = digest(&token);
        self.store
            .put(&token_key(&hashed), &user_id.to_string(), self.ttl)
            .await?;
        self.store
            .add_member(&user_key(user_id), &hashed, self.ttl)
            .await?;
        Ok(token)
    }

    /// Owner of a live token.
    pub async fn resolve(&self, token: &str) -> Result<Option<UserId>, Error> {
        let Some(raw) = self.store.get(&token_key(&digest(token))).await? else {
            return Ok(None);
        };
        match UserId::new(&raw) {
            Ok(user_id) => Ok(Some(user_id)),
            Err(_) => {
                debug!("discarding refresh token with malformed owner");
                Ok(None)
            }
        }
    }

    /// Revoke one token; unknown tokens are ignored.
    pub async fn revoke(&self, token: &str) -> Result<(), Error> {
        let hashed = digest(token);
        let key = token_key(&hashed);
        let owner = self.store.get(&key).await?;
        if let Some(user_id) = owner.and_then(|raw| UserId::new(raw).ok()) {
            self.store.remove_member(&user_key(&user_id), &hashed).await?;
        }
        self.store.remove(&key).await?;
        Ok(())
    }

    /// Revoke every token of `user_id`.
    pub async fn revoke_all(&self, user_id: &UserId) -> Result<(), Error> {
        let index = user_key(user_id);
        for hashed in self.store.members(&index).await? {
            self.store.remove(&token_key(&hashed)).await?;
        }
        self.store.remove(&index).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::outbound::memory::InMemoryExpiringStore;
    use rstest::{fixture, rstest};

    #[fixture]
    fn tokens() -> RefreshTokens {
        RefreshTokens::new(
            Arc::new(InMemoryExpiringStore::default()),
            Duration::from_secs(60),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn issued_tokens_resolve_to_their_owner(tokens: RefreshTokens) {
        let user = UserId::random();
        let token = tokens.issue(&user).await.expect("issue");
        assert_eq!(token.len(), 43);
        assert_eq!(tokens.resolve(&token).await.expect("resolve"), Some(user));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_tokens_resolve_to_none(tokens: RefreshTokens) {
        assert_eq!(tokens.resolve("nope").await.expect("resolve"), None);
    }

    #[rstest]
    #[tokio::test]
    async fn revoke_removes_only_that_token(tokens: RefreshTokens) {
        let user = UserId::random();
        let first = tokens.issue(&user).await.expect("issue");
        let second = tokens.issue(&user).await.expect("issue");
        tokens.revoke(&first).await.expect("revoke");
        assert_eq!(tokens.resolve(&first).await.expect("resolve"), None);
        assert_eq!(tokens.resolve(&second).await.expect("resolve"), Some(user));
    }

    #[rstest]
    #[tokio::test]
    async fn revoke_all_clears_every_session(tokens: RefreshTokens) {
        let user = UserId::random();
        let other = UserId::random();
        let first = tokens.issue(&user).await.expect("issue");
        let second = tokens.issue(&user).await.expect("issue");
        let unrelated = tokens.issue(&other).await.expect("issue");
        tokens.revoke_all(&user).await.expect("revoke all");
        assert_eq!(tokens.resolve(&first).await.expect("resolve"), None);
        assert_eq!(tokens.resolve(&second).await.expect("resolve"), None);
        assert_eq!(tokens.resolve(&unrelated).await.expect("resolve"), Some(other));
    }
}
