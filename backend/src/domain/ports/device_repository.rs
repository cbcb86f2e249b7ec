//! Port for the trusted-device registry.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{UserDevice, UserId};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Devices of a user, most recently used first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<UserDevice>, PersistenceError>;

    /// Device of `user_id` with the given fingerprint.
    async fn find_by_fingerprint(
        &self,
        user_id: &UserId,
        fingerprint: &str,
    ) -> Result<Option<UserDevice>, PersistenceError>;

    /// Register a device.
    async fn insert(&self, device: &UserDevice) -> Result<(), PersistenceError>;

    /// Record a fresh use of a known device.
    async fn touch(
        &self,
        device_id: Uuid,
        used_at: DateTime<Utc>,
        ip_address: Option<String>,
    ) -> Result<(), PersistenceError>;

    /// Remove a device owned by `user_id`; `false` when no such device.
    async fn delete(&self, user_id: &UserId, device_id: Uuid) -> Result<bool, PersistenceError>;

    /// Remove every device of a user, returning how many were removed.
    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, PersistenceError>;

    /// Number of registered devices across all users.
    async fn count_all(&self) -> Result<u64, PersistenceError>;
}
