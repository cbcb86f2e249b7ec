//! Port for short-lived key/value state kept between authentication steps.
//!
//! Pending registrations, device challenges, password reset codes and refresh
//! tokens all live here with a time-to-live. Values are opaque strings; the
//! services serialise their records as JSON.
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by expiring store adapters.
    pub enum ExpiringStoreError {
        /// Store backend is unavailable or timing out.
        Backend { message: String } => "expiring store backend failure: {message}",
        /// A stored value could not be encoded or decoded.
        Serialization { message: String } => "expiring store serialisation failed: {message}",
    }
}

impl From<ExpiringStoreError> for Error {
    fn from(err: ExpiringStoreError) -> Self {
        match err {
            ExpiringStoreError::Backend { message } => {
                Error::service_unavailable(format!("token store unavailable: {message}"))
            }
            ExpiringStoreError::Serialization { message } => {
                Error::internal(format!("token store error: {message}"))
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value and resetting
    /// its expiry.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ExpiringStoreError>;

    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, ExpiringStoreError>;

    /// Delete a key; missing keys are ignored.
    async fn remove(&self, key: &str) -> Result<(), ExpiringStoreError>;

    /// Add `member` to the set at `key` and refresh the set's expiry.
    async fn add_member(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), ExpiringStoreError>;

    /// Members of the set at `key`.
    async fn members(&self, key: &str) -> Result<Vec<String>, ExpiringStoreError>;

    /// Remove `member` from the set at `key`.
    async fn remove_member(&self, key: &str, member: &str) -> Result<(), ExpiringStoreError>;
}
