//! Port for secure message storage.
//!
//! `content` crosses this boundary encrypted.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{MailboxSide, Message, UserId};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a sent message.
    async fn insert(&self, message: &Message) -> Result<(), PersistenceError>;

    /// Fetch by identifier regardless of deletion flags.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, PersistenceError>;

    /// Messages received by `recipient` and not deleted on their side,
    /// newest first.
    async fn inbox(
        &self,
        recipient: &UserId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Message>, PersistenceError>;

    /// Unread, undeleted messages of `recipient`.
    async fn unread_count(&self, recipient: &UserId) -> Result<u64, PersistenceError>;

    /// Messages sent by `sender` and not deleted on their side, newest first.
    async fn sent(&self, sender: &UserId, limit: u32) -> Result<Vec<Message>, PersistenceError>;

    /// Flag a message read; no-op when already read.
    async fn mark_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<(), PersistenceError>;

    /// Hide a message from one side of the conversation.
    async fn mark_deleted(&self, id: Uuid, side: MailboxSide) -> Result<(), PersistenceError>;
}
