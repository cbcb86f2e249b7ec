//! Port for patient profile storage.
//!
//! Adapters receive profiles whose [`crate::domain::ProfileDetails`] already
//! hold ciphertext; encryption happens in the account service.
use async_trait::async_trait;

use crate::domain::{UserId, UserProfile};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Profile of a user, if one was saved.
    async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, PersistenceError>;

    /// Insert or replace the profile keyed by `profile.user_id`.
    async fn upsert(&self, profile: &UserProfile) -> Result<(), PersistenceError>;
}
