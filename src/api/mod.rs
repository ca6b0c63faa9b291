//! API Routes for Tend
//!
//! This module combines all API routes into a single router.
//!
//! Route structure:
//! - /api/chat/* - Conversation turns and history
//! - /api/memories/* - Memory CRUD, agent create, change events
//! - /health, /status - Health checks (public)
//!
//! No authentication is enforced at this layer; the reference deployment
//! delegates auth to the client-side provider. Known gap for production.

mod chat;
mod events;
mod memories;
pub mod status;

use axum::Router;

use crate::AppState;

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health and status endpoints (public)
        .merge(status::routes())
        // Conversation turns and history
        .nest("/api/chat", chat::routes())
        // Memory CRUD and per-user change events
        .nest("/api/memories", memories::routes().merge(events::routes()))
}
