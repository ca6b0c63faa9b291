//! Chat Routes
//!
//! Routes:
//! - GET /api/chat/:user_id - Chat history, oldest first
//! - POST /api/chat - Run one conversation turn

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{self, ChatMessage};
use crate::{AppState, Result};

/// Build chat routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message))
        .route("/:user_id", get(chat_history))
}

/// Request to run a conversation turn.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: String,
    pub content: String,
}

/// Both persisted messages of a completed turn.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: ChatMessage,
    #[serde(rename = "aiMessage")]
    pub ai_message: ChatMessage,
}

/// Get chat history for a user, ascending by creation time.
///
/// GET /api/chat/:user_id
async fn chat_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>> {
    let messages = db::list_messages(&state.db, &user_id).await?;
    Ok(Json(messages))
}

/// Run one conversation turn.
///
/// POST /api/chat
async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    let turn = state
        .chat
        .handle_turn(&request.user_id, &request.content)
        .await?;

    Ok(Json(SendMessageResponse {
        message: turn.message,
        ai_message: turn.ai_message,
    }))
}
