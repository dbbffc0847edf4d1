use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db, notify::{Rooms, ServerEvent}, users, AppError, AppResult};

pub const MAX_CONTENT_CHARS: usize = 2000;

/// A chat message. Created once, never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    timestamp: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = sqlx::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            content: row.content,
            timestamp: db::from_millis(row.timestamp)?,
        })
    }
}

impl Message {
    /// The other participant, from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id { self.receiver_id } else { self.sender_id }
    }
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::invalid("message content is empty"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::invalid(format!("message is longer than {MAX_CONTENT_CHARS} characters")));
    }
    Ok(())
}

/// Persists a message between two matched users and pushes it to both of
/// their rooms, so the sender's other sessions see it too.
pub async fn send_message(
    db_pool: &SqlitePool,
    rooms: &Rooms,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
) -> AppResult<Message> {
    validate_content(&content)?;
    if sender_id == receiver_id {
        return Err(AppError::invalid("cannot message yourself"));
    }
    if !users::exists(db_pool, sender_id).await? {
        return Err(AppError::NotFound("sender"));
    }
    if !users::exists(db_pool, receiver_id).await? {
        return Err(AppError::NotFound("receiver"));
    }
    if !users::is_matched(db_pool, sender_id, receiver_id).await? {
        tracing::warn!(sender = %sender_id, receiver = %receiver_id, "message to a non-match rejected");
        return Err(AppError::NotMatched);
    }

    let timestamp = db::now_millis();
    let message = Message {
        id: Uuid::now_v7(),
        sender_id,
        receiver_id,
        content,
        timestamp: db::from_millis(timestamp)?,
    };

    sqlx::query("INSERT INTO messages (id,sender_id,receiver_id,content,timestamp) VALUES (?,?,?,?,?)")
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(timestamp)
        .execute(db_pool)
        .await?;

    let event = ServerEvent::ReceiveMessage(message.clone());
    let delivered = rooms.publish(receiver_id, &event) + rooms.publish(sender_id, &event);
    tracing::info!(id = %message.id, sender = %sender_id, receiver = %receiver_id, delivered, "message relayed");

    Ok(message)
}

/// Every message between the two users, oldest first.
pub async fn history(db_pool: &SqlitePool, user_id: Uuid, partner_id: Uuid) -> AppResult<Vec<Message>> {
    if !users::exists(db_pool, partner_id).await? {
        return Err(AppError::NotFound("chat partner"));
    }

    let rows: Vec<MessageRow> = sqlx::query_as(
        "SELECT id,sender_id,receiver_id,content,timestamp FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY timestamp, rowid",
    )
    .bind(user_id)
    .bind(partner_id)
    .fetch_all(db_pool)
    .await?;

    Ok(rows.into_iter().map(Message::try_from).collect::<Result<_, _>>()?)
}
