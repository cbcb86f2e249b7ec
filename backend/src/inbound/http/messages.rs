//! Secure messaging handlers under `/api/v1/messages`.
//!
//! ```text
//! POST /api/v1/messages {"recipientId":"..","content":"..","isEmergency":false}
//! GET  /api/v1/messages/inbox?limit=50&unreadOnly=true
//! ```

use actix_web::{HttpResponse, delete, get, post, web};
use chrono::{DateTime, Utc};
use pagination::PageBounds;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{Error, Inbox, Message, NewMessage};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::users::MessageResponse;
use crate::inbound::http::validation::{
    FieldName, bounded_limit, parse_optional_uuid, parse_user_id, parse_uuid,
};

const MAILBOX_PAGE: PageBounds = PageBounds::new(50, 100);

/// Body for `POST /api/v1/messages`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: String,
    /// At most 255 characters.
    pub subject: Option<String>,
    /// 1 to 5000 characters; stored encrypted.
    pub content: String,
    #[serde(default)]
    pub is_emergency: bool,
    pub parent_message_id: Option<String>,
}

impl TryFrom<SendMessageRequest> for NewMessage {
    type Error = Error;

    fn try_from(value: SendMessageRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            recipient_id: parse_user_id(&value.recipient_id, FieldName::new("recipientId"))?,
            subject: value.subject,
            content: value.content,
            is_emergency: value.is_emergency,
            parent_message_id: parse_optional_uuid(
                value.parent_message_id.as_deref(),
                FieldName::new("parentMessageId"),
            )?,
        })
    }
}

/// Query for `GET /api/v1/messages/inbox`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InboxQuery {
    /// 1 to 100; defaults to 50.
    pub limit: Option<u32>,
    #[serde(default)]
    pub unread_only: bool,
}

/// Query for `GET /api/v1/messages/sent`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SentQuery {
    /// 1 to 100; defaults to 50.
    pub limit: Option<u32>,
}

/// Decrypted message as seen by a participant.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub subject: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub is_emergency: bool,
    pub parent_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for ConversationMessage {
    fn from(value: Message) -> Self {
        Self {
            id: value.id,
            sender_id: *value.sender_id.as_uuid(),
            recipient_id: *value.recipient_id.as_uuid(),
            subject: value.subject,
            content: value.content,
            is_read: value.is_read,
            read_at: value.read_at,
            is_emergency: value.is_emergency,
            parent_message_id: value.parent_message_id,
            created_at: value.created_at,
        }
    }
}

/// Inbox listing with the unread counter.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InboxResponse {
    pub messages: Vec<ConversationMessage>,
    /// Unread messages still in the inbox, regardless of `limit`.
    pub unread_count: u64,
}

impl From<Inbox> for InboxResponse {
    fn from(value: Inbox) -> Self {
        Self {
            messages: value.messages.into_iter().map(Into::into).collect(),
            unread_count: value.unread_count,
        }
    }
}

fn message_id(raw: &str) -> Result<Uuid, Error> {
    parse_uuid(raw, FieldName::new("messageId"))
}

/// Send a message to another active user.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = ConversationMessage),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Recipient or parent not found", body = ErrorSchema)
    ),
    tags = ["messages"],
    operation_id = "sendMessage",
    security(("AccessToken" = []))
)]
#[post("/messages")]
pub async fn send_message(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<SendMessageRequest>,
) -> ApiResult<HttpResponse> {
    let request = NewMessage::try_from(payload.into_inner())?;
    let message = state.messages.send(auth.actor(), request).await?;
    Ok(HttpResponse::Created().json(ConversationMessage::from(message)))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/inbox",
    params(InboxQuery),
    responses(
        (status = 200, description = "Received messages, newest first", body = InboxResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["messages"],
    operation_id = "inbox",
    security(("AccessToken" = []))
)]
#[get("/messages/inbox")]
pub async fn inbox(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<InboxQuery>,
) -> ApiResult<web::Json<InboxResponse>> {
    let limit = bounded_limit(query.limit, MAILBOX_PAGE)?;
    let mailbox = state
        .messages
        .inbox(auth.actor(), query.unread_only, limit)
        .await?;
    Ok(web::Json(mailbox.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/sent",
    params(SentQuery),
    responses(
        (status = 200, description = "Sent messages, newest first", body = [ConversationMessage]),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["messages"],
    operation_id = "sentMessages",
    security(("AccessToken" = []))
)]
#[get("/messages/sent")]
pub async fn sent_messages(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<SentQuery>,
) -> ApiResult<web::Json<Vec<ConversationMessage>>> {
    let limit = bounded_limit(query.limit, MAILBOX_PAGE)?;
    let sent = state.messages.sent(auth.actor(), limit).await?;
    Ok(web::Json(sent.into_iter().map(Into::into).collect()))
}

/// Open a message; the recipient opening it marks it read.
#[utoipa::path(
    get,
    path = "/api/v1/messages/{message_id}",
    params(("message_id" = String, Path, description = "Message identifier")),
    responses(
        (status = 200, description = "Message", body = ConversationMessage),
        (status = 403, description = "Not a participant", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["messages"],
    operation_id = "getMessage",
    security(("AccessToken" = []))
)]
#[get("/messages/{message_id}")]
pub async fn get_message(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<ConversationMessage>> {
    let id = message_id(&path)?;
    let message = state.messages.get(auth.actor(), id).await?;
    Ok(web::Json(message.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/messages/{message_id}/mark-read",
    params(("message_id" = String, Path, description = "Message identifier")),
    responses(
        (status = 200, description = "Marked read", body = MessageResponse),
        (status = 403, description = "Not the recipient", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["messages"],
    operation_id = "markMessageRead",
    security(("AccessToken" = []))
)]
#[post("/messages/{message_id}/mark-read")]
pub async fn mark_read(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<MessageResponse>> {
    let id = message_id(&path)?;
    state.messages.mark_read(auth.actor(), id).await?;
    Ok(web::Json(MessageResponse::new("message marked as read")))
}

/// Hide a message from the caller's side of the conversation.
#[utoipa::path(
    delete,
    path = "/api/v1/messages/{message_id}",
    params(("message_id" = String, Path, description = "Message identifier")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not a participant", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["messages"],
    operation_id = "deleteMessage",
    security(("AccessToken" = []))
)]
#[delete("/messages/{message_id}")]
pub async fn delete_message(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<MessageResponse>> {
    let id = message_id(&path)?;
    state.messages.delete(auth.actor(), id).await?;
    Ok(web::Json(MessageResponse::new("message deleted")))
}
