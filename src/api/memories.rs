//! Memories Routes
//!
//! CRUD operations for user memories, plus the agent-facing create route.
//!
//! Routes:
//! - GET /api/memories/:user_id - List memories, newest first
//! - POST /api/memories - Create a memory
//! - PATCH /api/memories/:id - Update category and/or content
//! - DELETE /api/memories/:id - Delete a memory
//! - POST /api/memories/agent - Create a memory on the agent's behalf
//!
//! The `/:id` segment is overloaded by the wire API: a user id for GET,
//! a memory id for PATCH and DELETE.

use axum::response::{IntoResponse, Response};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{self, CreateMemory, Memory, UpdateMemory};
use crate::models::{self, MemoryCategory, MemoryCreator};
use crate::{AppState, Error, Result};

/// Build memory routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_memory))
        .route("/agent", post(create_agent_memory))
        .route(
            "/:id",
            get(list_memories).patch(update_memory).delete(delete_memory),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a memory.
#[derive(Debug, Deserialize)]
pub struct CreateMemoryRequest {
    pub user_id: String,
    pub category: String,
    pub content: String,
    pub importance: Option<f64>,
}

/// Request to create a memory on the agent's behalf. Fields are optional
/// so missing ones produce a descriptive error instead of a rejection at
/// the deserialization layer.
#[derive(Debug, Deserialize)]
pub struct AgentMemoryRequest {
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub importance: Option<f64>,
}

/// Request to update a memory.
#[derive(Debug, Deserialize)]
pub struct UpdateMemoryRequest {
    pub category: Option<String>,
    pub content: Option<String>,
}

/// Delete confirmation.
#[derive(Debug, Serialize)]
pub struct DeleteMemoryResponse {
    pub success: bool,
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a raw category string against the closed set.
fn parse_category(raw: &str) -> Result<MemoryCategory> {
    MemoryCategory::from_str(raw).ok_or_else(|| {
        Error::Validation(format!(
            "Invalid category. Must be one of: {}",
            MemoryCategory::all()
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

fn require_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::Validation("Content cannot be empty".into()));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// List memories for a user, newest first.
///
/// GET /api/memories/:user_id
async fn list_memories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Memory>>> {
    let memories = db::list_memories(&state.db, &user_id).await?;
    Ok(Json(memories))
}

/// Create a new memory by direct user action.
///
/// POST /api/memories
async fn create_memory(
    State(state): State<AppState>,
    Json(request): Json<CreateMemoryRequest>,
) -> Result<Json<Memory>> {
    if request.user_id.trim().is_empty() {
        return Err(Error::Validation("user_id is required".into()));
    }
    let category = parse_category(&request.category)?;
    require_content(&request.content)?;

    let memory = db::create_memory(
        &state.db,
        CreateMemory {
            id: models::new_id(),
            user_id: request.user_id,
            category,
            content: request.content,
            importance: request.importance.unwrap_or(1.0),
            created_by: MemoryCreator::User,
        },
    )
    .await?;

    state.feed.created(&memory);

    Ok(Json(memory))
}

/// Update a memory's category and/or content.
///
/// PATCH /api/memories/:id
async fn update_memory(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Json(request): Json<UpdateMemoryRequest>,
) -> Result<Json<Memory>> {
    let category = request.category.as_deref().map(parse_category).transpose()?;
    if let Some(ref content) = request.content {
        require_content(content)?;
    }

    let memory = db::update_memory(
        &state.db,
        &memory_id,
        UpdateMemory {
            category,
            content: request.content,
        },
    )
    .await?;

    state.feed.updated(&memory);

    Ok(Json(memory))
}

/// Delete a memory.
///
/// DELETE /api/memories/:id
async fn delete_memory(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
) -> Result<Json<DeleteMemoryResponse>> {
    // Fetched first so the change event can carry the owning user.
    let memory = db::get_memory(&state.db, &memory_id).await?;
    db::delete_memory(&state.db, &memory_id).await?;

    state.feed.deleted(&memory.user_id, &memory_id);

    Ok(Json(DeleteMemoryResponse { success: true }))
}

/// Create a memory on the agent's behalf.
///
/// POST /api/memories/agent
///
/// Unlike the direct create route, the response always carries a `success`
/// flag and failures include the descriptive error in the body.
async fn create_agent_memory(
    State(state): State<AppState>,
    Json(request): Json<AgentMemoryRequest>,
) -> Response {
    match try_create_agent_memory(&state, request).await {
        Ok(memory) => Json(json!({ "success": true, "memory": memory })).into_response(),
        Err(e) => (
            e.status_code(),
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn try_create_agent_memory(state: &AppState, request: AgentMemoryRequest) -> Result<Memory> {
    let (Some(user_id), Some(category), Some(content)) =
        (request.user_id, request.category, request.content)
    else {
        return Err(Error::Validation(
            "Missing required fields: user_id, category, and content are required".into(),
        ));
    };

    let category = parse_category(&category)?;
    require_content(&content)?;

    let memory = db::create_memory(
        &state.db,
        CreateMemory {
            id: models::new_id(),
            user_id,
            category,
            content,
            importance: request.importance.unwrap_or(1.0),
            created_by: MemoryCreator::Agent,
        },
    )
    .await?;

    state.feed.created(&memory);

    Ok(memory)
}
