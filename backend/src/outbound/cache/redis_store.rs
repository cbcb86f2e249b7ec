//! Pooled Redis implementation of the expiring store.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{AsyncCommands, RedisError};
use thiserror::Error;
use tracing::info;

use crate::domain::ports::{ExpiringStore, ExpiringStoreError};

/// Errors raised while building the Redis pool.
#[derive(Debug, Error)]
pub enum RedisStoreError {
    /// The URL could not be parsed.
    #[error("invalid redis url: {0}")]
    InvalidUrl(#[source] RedisError),
    /// The pool failed its initial connection.
    #[error("failed to build redis pool: {0}")]
    Build(#[source] RedisError),
}

/// [`ExpiringStore`] backed by Redis.
#[derive(Clone)]
pub struct RedisExpiringStore {
    pool: Pool<RedisConnectionManager>,
}

impl RedisExpiringStore {
    /// Connect to `url` with up to `max_size` pooled connections.
    ///
    /// # Errors
    /// Returns [`RedisStoreError`] when the URL is invalid or no connection
    /// can be established.
    pub async fn connect(url: &str, max_size: u32) -> Result<Self, RedisStoreError> {
        let manager = RedisConnectionManager::new(url).map_err(RedisStoreError::InvalidUrl)?;
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .await
            .map_err(RedisStoreError::Build)?;
        info!(max_size, "redis expiring store ready");
        Ok(Self { pool })
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, ExpiringStoreError> {
        self.pool
            .get()
            .await
            .map_err(|err| ExpiringStoreError::backend(err.to_string()))
    }
}

fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn backend(err: &RedisError) -> ExpiringStoreError {
    ExpiringStoreError::backend(err.to_string())
}

#[async_trait]
impl ExpiringStore for RedisExpiringStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ExpiringStoreError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds(ttl))
            .await
            .map_err(|err| backend(&err))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ExpiringStoreError> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(|err| backend(&err))
    }

    async fn remove(&self, key: &str) -> Result<(), ExpiringStoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(|err| backend(&err))
    }

    async fn add_member(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), ExpiringStoreError> {
        let mut conn = self.connection().await?;
        conn.sadd::<_, _, ()>(key, member)
            .await
            .map_err(|err| backend(&err))?;
        let seconds = i64::try_from(ttl_seconds(ttl)).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(key, seconds)
            .await
            .map_err(|err| backend(&err))
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, ExpiringStoreError> {
        let mut conn = self.connection().await?;
        conn.smembers(key).await.map_err(|err| backend(&err))
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), ExpiringStoreError> {
        let mut conn = self.connection().await?;
        conn.srem::<_, _, ()>(key, member)
            .await
            .map_err(|err| backend(&err))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_secs(0), 1)]
    #[case(Duration::from_millis(1500), 1)]
    #[case(Duration::from_secs(600), 600)]
    fn ttl_is_at_least_one_second(#[case] ttl: Duration, #[case] expected: u64) {
        assert_eq!(ttl_seconds(ttl), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn malformed_urls_are_rejected_before_connecting() {
        let err = RedisExpiringStore::connect("not a url", 1)
            .await
            .err()
            .expect("invalid url");
        assert!(matches!(err, RedisStoreError::InvalidUrl(_)));
    }
}
