//! Service layer for Tend.
//!
//! Contains business logic and external service integrations:
//! - Llm (multi-provider completion with fallback)
//! - Extraction (utterance -> zero-or-one memory decision)
//! - Chat (conversation orchestration)
//! - Feed (memory change notifications)

mod chat;
mod extraction;
mod feed;
mod llm;

pub use chat::{ChatService, Turn};
pub use extraction::{ExtractionService, MemoryDraft};
pub use feed::{MemoryChange, MemoryEvent, MemoryFeed};
pub use llm::{LlmService, Segment, SegmentRole};
