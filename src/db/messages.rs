//! Chat message database queries.
//!
//! Messages are append-only: one user-role and one assistant-role message
//! are created per conversation turn and never updated or deleted.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DbPool;
use crate::models::{self, MessageRole};
use crate::Result;

/// Chat message record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub content: String,
    /// Role of the message: 'user' or 'assistant'
    pub role: String,
    pub created_at: String,
}

impl ChatMessage {
    /// Get the role as enum.
    pub fn role_enum(&self) -> Option<MessageRole> {
        MessageRole::from_str(&self.role)
    }
}

/// Input for creating a new chat message.
#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub role: MessageRole,
}

/// Append a chat message.
pub async fn create_message(pool: &DbPool, input: CreateMessage) -> Result<ChatMessage> {
    let message = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO chat_messages (id, user_id, content, role, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.user_id)
    .bind(&input.content)
    .bind(input.role.as_str())
    .bind(models::now())
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// List all messages for a user in insertion order.
pub async fn list_messages(pool: &DbPool, user_id: &str) -> Result<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        // rowid breaks ties for rows created in the same millisecond
        "SELECT * FROM chat_messages WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}
