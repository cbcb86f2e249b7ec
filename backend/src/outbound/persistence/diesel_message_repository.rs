//! PostgreSQL-backed `MessageRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{MessageRepository, PersistenceError};
use crate::domain::{MailboxSide, Message, UserId};

use super::diesel_helpers::{map_diesel_error, map_pool_error, to_count};
use super::models::MessageRow;
use super::pool::DbPool;
use super::schema::messages;

/// Diesel-backed implementation of the `MessageRepository` port.
#[derive(Clone)]
pub struct DieselMessageRepository {
    pool: DbPool,
}

impl DieselMessageRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: MessageRow) -> Message {
    Message {
        id: row.id,
        sender_id: UserId::from_uuid(row.sender_id),
        recipient_id: UserId::from_uuid(row.recipient_id),
        subject: row.subject,
        content: row.content,
        is_read: row.is_read,
        read_at: row.read_at,
        is_emergency: row.is_emergency,
        parent_message_id: row.parent_message_id,
        deleted_by_sender: row.deleted_by_sender,
        deleted_by_recipient: row.deleted_by_recipient,
        created_at: row.created_at,
    }
}

fn message_to_row(message: &Message) -> MessageRow {
    MessageRow {
        id: message.id,
        sender_id: *message.sender_id.as_uuid(),
        recipient_id: *message.recipient_id.as_uuid(),
        subject: message.subject.clone(),
        content: message.content.clone(),
        is_read: message.is_read,
        read_at: message.read_at,
        is_emergency: message.is_emergency,
        parent_message_id: message.parent_message_id,
        deleted_by_sender: message.deleted_by_sender,
        deleted_by_recipient: message.deleted_by_recipient,
        created_at: message.created_at,
    }
}

#[async_trait]
impl MessageRepository for DieselMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(messages::table)
            .values(&message_to_row(message))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<MessageRow> = messages::table
            .filter(messages::id.eq(id))
            .select(MessageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_message))
    }

    async fn inbox(
        &self,
        recipient: &UserId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Message>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = messages::table
            .filter(messages::recipient_id.eq(*recipient.as_uuid()))
            .filter(messages::deleted_by_recipient.eq(false))
            .into_boxed();
        if unread_only {
            query = query.filter(messages::is_read.eq(false));
        }
        let rows: Vec<MessageRow> = query
            .select(MessageRow::as_select())
            .order_by(messages::created_at.desc())
            .limit(i64::from(limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_message).collect())
    }

    async fn unread_count(&self, recipient: &UserId) -> Result<u64, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = messages::table
            .filter(messages::recipient_id.eq(recipient.as_uuid()))
            .filter(messages::deleted_by_recipient.eq(false))
            .filter(messages::is_read.eq(false))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(to_count(total))
    }

    async fn sent(&self, sender: &UserId, limit: u32) -> Result<Vec<Message>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<MessageRow> = messages::table
            .filter(messages::sender_id.eq(sender.as_uuid()))
            .filter(messages::deleted_by_sender.eq(false))
            .select(MessageRow::as_select())
            .order_by(messages::created_at.desc())
            .limit(i64::from(limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_message).collect())
    }

    async fn mark_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            messages::table.filter(messages::id.eq(id).and(messages::is_read.eq(false))),
        )
        .set((messages::is_read.eq(true), messages::read_at.eq(Some(read_at))))
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
    }

    async fn mark_deleted(&self, id: Uuid, side: MailboxSide) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let target = messages::table.filter(messages::id.eq(id));
        let result = match side {
            MailboxSide::Sender => {
                diesel::update(target)
                    .set(messages::deleted_by_sender.eq(true))
                    .execute(&mut conn)
                    .await
            }
            MailboxSide::Recipient => {
                diesel::update(target)
                    .set(messages::deleted_by_recipient.eq(true))
                    .execute(&mut conn)
                    .await
            }
        };
        result.map(|_| ()).map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn messages_round_trip_through_rows() {
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: UserId::random(),
            recipient_id: UserId::random(),
            subject: Some("Follow-up".into()),
            content: "v1:opaque".into(),
            is_read: false,
            read_at: None,
            is_emergency: true,
            parent_message_id: None,
            deleted_by_sender: false,
            deleted_by_recipient: true,
            created_at: Utc::now(),
        };
        assert_eq!(row_to_message(message_to_row(&message)), message);
    }
}
