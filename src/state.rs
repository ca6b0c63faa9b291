//! Application state for Tend.
//!
//! Contains the shared state that is passed to all handlers. Every service
//! is constructed once at startup and injected; handlers never reach for
//! ambient global clients.

use std::sync::Arc;

use crate::db::DbPool;
use crate::services::{ChatService, ExtractionService, LlmService, MemoryFeed};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// LLM completion service.
    pub llm: Arc<LlmService>,
    /// Conversation orchestration service.
    pub chat: ChatService,
    /// Memory change feed.
    pub feed: MemoryFeed,
}

impl AppState {
    /// Create a new application state, initializing all services.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        // Initialize database
        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;

        // Initialize services
        let llm = Arc::new(LlmService::from_config(&config.llm));
        let feed = MemoryFeed::new();
        let extraction = ExtractionService::new(llm.clone());
        let chat = ChatService::new(db.clone(), llm.clone(), extraction, feed.clone());

        Ok(Self {
            db,
            llm,
            chat,
            feed,
        })
    }
}
