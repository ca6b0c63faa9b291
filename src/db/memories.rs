//! Memory database queries.
//!
//! Memories are durable, categorized facts about a user, created either
//! by direct user action or by the extraction engine on the agent's
//! behalf. Updates are destructive overwrites; there is no versioning.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DbPool;
use crate::models::{self, MemoryCategory, MemoryCreator};
use crate::{Error, Result};

/// Memory record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub content: String,
    pub importance: f64,
    /// Who created the memory: 'user' or 'agent'
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Memory {
    /// Get the category as enum.
    pub fn category_enum(&self) -> Option<MemoryCategory> {
        MemoryCategory::from_str(&self.category)
    }

    /// Get the creator as enum.
    pub fn creator_enum(&self) -> Option<MemoryCreator> {
        MemoryCreator::from_str(&self.created_by)
    }
}

/// Input for creating a new memory.
#[derive(Debug, Clone)]
pub struct CreateMemory {
    pub id: String,
    pub user_id: String,
    pub category: MemoryCategory,
    pub content: String,
    pub importance: f64,
    pub created_by: MemoryCreator,
}

/// Input for updating a memory. Unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateMemory {
    pub category: Option<MemoryCategory>,
    pub content: Option<String>,
}

/// Create a new memory.
pub async fn create_memory(pool: &DbPool, input: CreateMemory) -> Result<Memory> {
    let now = models::now();

    let memory = sqlx::query_as::<_, Memory>(
        r#"
        INSERT INTO memories (id, user_id, category, content, importance, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.user_id)
    .bind(input.category.as_str())
    .bind(&input.content)
    .bind(input.importance)
    .bind(input.created_by.as_str())
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    Ok(memory)
}

/// Get a memory by ID.
pub async fn get_memory(pool: &DbPool, id: &str) -> Result<Memory> {
    sqlx::query_as::<_, Memory>("SELECT * FROM memories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Memory not found: {}", id)))
}

/// List all memories for a user, newest first.
pub async fn list_memories(pool: &DbPool, user_id: &str) -> Result<Vec<Memory>> {
    let memories = sqlx::query_as::<_, Memory>(
        // rowid breaks ties for rows created in the same millisecond
        "SELECT * FROM memories WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(memories)
}

/// Update a memory's category and/or content.
pub async fn update_memory(pool: &DbPool, id: &str, update: UpdateMemory) -> Result<Memory> {
    sqlx::query_as::<_, Memory>(
        r#"
        UPDATE memories
        SET category = COALESCE(?, category),
            content = COALESCE(?, content),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(update.category.map(|c| c.as_str()))
    .bind(&update.content)
    .bind(models::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Memory not found: {}", id)))
}

/// Delete a memory by ID.
pub async fn delete_memory(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM memories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Memory not found: {}", id)));
    }

    Ok(())
}
