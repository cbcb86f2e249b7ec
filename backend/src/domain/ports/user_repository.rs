//! Port abstraction for user persistence adapters.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::{Page, PageRequest};

use crate::domain::{Email, Role, User, UserId};

use super::PersistenceError;

/// Filter applied to administrative user listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserListFilter {
    /// Restrict to one role.
    pub role: Option<Role>,
    /// Restrict by verification flag.
    pub is_verified: Option<bool>,
}

/// Aggregate counts over the user table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserCounts {
    /// Every stored account, active or not.
    pub total: u64,
    /// Accounts with a confirmed email.
    pub verified: u64,
    /// Accounts per role; roles without accounts may be omitted.
    pub by_role: Vec<(Role, u64)>,
}

/// Storage for accounts and their password material.
///
/// Password hashes never travel inside [`User`]; they are read and written
/// through the dedicated methods so that listings cannot leak them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account.
    ///
    /// Returns [`PersistenceError::Conflict`] when the email is taken.
    async fn insert(&self, user: &User, password_hash: &str) -> Result<(), PersistenceError>;

    /// Fetch a user by identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, PersistenceError>;

    /// Fetch a user by normalised email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, PersistenceError>;

    /// Persist profile fields, flags and timestamps of an existing user.
    ///
    /// Returns [`PersistenceError::Conflict`] when a changed email is taken.
    async fn update(&self, user: &User) -> Result<(), PersistenceError>;

    /// Current password hash of a user.
    async fn password_hash(&self, id: &UserId) -> Result<Option<String>, PersistenceError>;

    /// Replace the password hash, archiving the previous one in the history.
    async fn replace_password(
        &self,
        id: &UserId,
        new_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Most recent archived hashes, newest first.
    async fn recent_password_hashes(
        &self,
        id: &UserId,
        limit: u32,
    ) -> Result<Vec<String>, PersistenceError>;

    /// Page through users ordered by creation time.
    async fn list(
        &self,
        filter: UserListFilter,
        page: PageRequest,
    ) -> Result<Page<User>, PersistenceError>;

    /// Aggregate counts for the statistics endpoint.
    async fn counts(&self) -> Result<UserCounts, PersistenceError>;
}
