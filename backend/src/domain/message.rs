//! Secure messages between users.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::UserId;

/// Maximum subject length.
pub const SUBJECT_MAX: usize = 255;
/// Maximum body length.
pub const CONTENT_MAX: usize = 5000;

/// Message exchanged between two users.
///
/// `content` is plaintext inside the domain; repositories store ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Identifier.
    pub id: Uuid,
    /// Author.
    pub sender_id: UserId,
    /// Addressee.
    pub recipient_id: UserId,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Body.
    pub content: String,
    /// Whether the recipient has opened the message.
    pub is_read: bool,
    /// When the recipient opened it.
    pub read_at: Option<DateTime<Utc>>,
    /// Urgent flag.
    pub is_emergency: bool,
    /// Message this one replies to.
    pub parent_message_id: Option<Uuid>,
    /// Hidden from the sender's view.
    pub deleted_by_sender: bool,
    /// Hidden from the recipient's view.
    pub deleted_by_recipient: bool,
    /// Sending timestamp.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether `user` sent or received the message.
    pub fn involves(&self, user: &UserId) -> bool {
        self.sender_id == *user || self.recipient_id == *user
    }
}

/// Side of a conversation a deletion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSide {
    /// The author's sent folder.
    Sender,
    /// The addressee's inbox.
    Recipient,
}

/// Inbox listing with the unread counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbox {
    /// Messages, newest first.
    pub messages: Vec<Message>,
    /// Unread messages not deleted by the recipient.
    pub unread_count: u64,
}
