//! Secure messaging between users.
//!
//! Message bodies are encrypted with the [`FieldCipher`] before they reach
//! the repository and decrypted on the way out; subjects stay in clear so
//! inbox listings can be scanned without key material.

use std::sync::Arc;

use mockable::Clock;
use tracing::{info, warn};
use uuid::Uuid;

use super::message::{CONTENT_MAX, SUBJECT_MAX};
use super::ports::{FieldCipher, MessageRepository, UserRepository};
use super::{Actor, Error, Inbox, MailboxSide, Message, UserId};

/// Message composed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Receiving user.
    pub recipient_id: UserId,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Plaintext body.
    pub content: String,
    /// Flag for urgent messages.
    pub is_emergency: bool,
    /// Message being replied to.
    pub parent_message_id: Option<Uuid>,
}

/// Messaging service.
#[derive(Clone)]
pub struct MessagingService {
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
    cipher: Arc<dyn FieldCipher>,
    clock: Arc<dyn Clock>,
}

fn not_found() -> Error {
    Error::not_found("message not found")
}

impl MessagingService {
    /// Create the service.
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
        cipher: Arc<dyn FieldCipher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messages,
            users,
            cipher,
            clock,
        }
    }

    fn reveal(&self, mut message: Message) -> Result<Message, Error> {
        message.content = self.cipher.decrypt(&message.content)?;
        Ok(message)
    }

    fn reveal_all(&self, messages: Vec<Message>) -> Result<Vec<Message>, Error> {
        messages
            .into_iter()
            .map(|message| self.reveal(message))
            .collect()
    }

    async fn load_visible(&self, actor: &Actor, id: Uuid) -> Result<Message, Error> {
        let message = self.messages.find_by_id(id).await?.ok_or_else(not_found)?;
        if !message.involves(&actor.user_id) {
            return Err(Error::forbidden("not authorised to access this message"));
        }
        let hidden = (message.sender_id == actor.user_id && message.deleted_by_sender)
            || (message.recipient_id == actor.user_id && message.deleted_by_recipient);
        if hidden {
            return Err(not_found());
        }
        Ok(message)
    }

    /// Send a message to another active user.
    pub async fn send(&self, actor: &Actor, request: NewMessage) -> Result<Message, Error> {
        if request.recipient_id == actor.user_id {
            return Err(Error::invalid_request("cannot send a message to yourself"));
        }
        let subject = request
            .subject
            .map(|subject| subject.trim().to_owned())
            .filter(|subject| !subject.is_empty());
        if subject
            .as_ref()
            .is_some_and(|subject| subject.chars().count() > SUBJECT_MAX)
        {
            return Err(Error::invalid_request(format!(
                "subject must be at most {SUBJECT_MAX} characters"
            )));
        }
        let length = request.content.trim().chars().count();
        if length == 0 || request.content.chars().count() > CONTENT_MAX {
            return Err(Error::invalid_request(format!(
                "content must be between 1 and {CONTENT_MAX} characters"
            )));
        }
        self.users
            .find_by_id(&request.recipient_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| Error::not_found("recipient not found"))?;
        if let Some(parent_id) = request.parent_message_id {
            let parent = self.messages.find_by_id(parent_id).await?;
            if !parent.is_some_and(|parent| parent.involves(&actor.user_id)) {
                return Err(Error::not_found("parent message not found"));
            }
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: actor.user_id,
            recipient_id: request.recipient_id,
            subject,
            content: request.content,
            is_read: false,
            read_at: None,
            is_emergency: request.is_emergency,
            parent_message_id: request.parent_message_id,
            deleted_by_sender: false,
            deleted_by_recipient: false,
            created_at: self.clock.utc(),
        };
        let stored = Message {
            content: self.cipher.encrypt(&message.content)?,
            ..message.clone()
        };
        self.messages.insert(&stored).await?;
        if message.is_emergency {
            warn!(message_id = %message.id, sender_id = %actor.user_id, recipient_id = %message.recipient_id, "emergency message sent");
        } else {
            info!(message_id = %message.id, sender_id = %actor.user_id, "message sent");
        }
        Ok(message)
    }

    /// Received messages, newest first, with the unread total.
    pub async fn inbox(&self, actor: &Actor, unread_only: bool, limit: u32) -> Result<Inbox, Error> {
        let messages = self
            .messages
            .inbox(&actor.user_id, unread_only, limit)
            .await?;
        let unread_count = self.messages.unread_count(&actor.user_id).await?;
        Ok(Inbox {
            messages: self.reveal_all(messages)?,
            unread_count,
        })
    }

    /// Sent messages, newest first.
    pub async fn sent(&self, actor: &Actor, limit: u32) -> Result<Vec<Message>, Error> {
        let messages = self.messages.sent(&actor.user_id, limit).await?;
        self.reveal_all(messages)
    }

    /// One message; reading it as the recipient marks it read.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Message, Error> {
        let mut message = self.load_visible(actor, id).await?;
        if message.recipient_id == actor.user_id && !message.is_read {
            let now = self.clock.utc();
            self.messages.mark_read(id, now).await?;
            message.is_read = true;
            message.read_at = Some(now);
        }
        self.reveal(message)
    }

    /// Flag a received message read.
    pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> Result<(), Error> {
        let message = self.load_visible(actor, id).await?;
        if message.recipient_id != actor.user_id {
            return Err(Error::forbidden("only the recipient can mark a message read"));
        }
        if !message.is_read {
            self.messages.mark_read(id, self.clock.utc()).await?;
        }
        Ok(())
    }

    /// Hide a message from the caller's side of the conversation.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), Error> {
        let message = self.load_visible(actor, id).await?;
        let side = if message.sender_id == actor.user_id {
            MailboxSide::Sender
        } else {
            MailboxSide::Recipient
        };
        self.messages.mark_deleted(id, side).await?;
        info!(message_id = %id, user_id = %actor.user_id, "message deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "messaging_service_tests.rs"]
mod tests;
