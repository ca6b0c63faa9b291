//! Conversation orchestration.
//!
//! Coordinates one turn: persist the user's message, build completion
//! context from the memory set, obtain the reply, run extraction, persist
//! any new memory, persist the reply.
//!
//! The write sequence is deliberately not transactional. A turn that dies
//! mid-sequence leaves partial state (a user message with no reply); this
//! weak consistency is an accepted property of the design.

use std::sync::Arc;

use tracing::{info, warn};

use super::extraction::ExtractionService;
use super::feed::MemoryFeed;
use super::llm::{LlmService, Segment};
use crate::db::{self, ChatMessage, CreateMemory, CreateMessage, DbPool, Memory};
use crate::models::{self, MemoryCreator, MessageRole};
use crate::{Error, Result};

/// Token budget for the conversational reply.
const REPLY_MAX_TOKENS: u32 = 1024;

/// Importance assigned to extracted memories.
const AGENT_MEMORY_IMPORTANCE: f64 = 1.0;

/// The two persisted messages of a completed turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub message: ChatMessage,
    pub ai_message: ChatMessage,
}

/// Service coordinating conversation turns.
#[derive(Clone)]
pub struct ChatService {
    db: DbPool,
    llm: Arc<LlmService>,
    extraction: ExtractionService,
    feed: MemoryFeed,
}

impl ChatService {
    pub fn new(
        db: DbPool,
        llm: Arc<LlmService>,
        extraction: ExtractionService,
        feed: MemoryFeed,
    ) -> Self {
        Self {
            db,
            llm,
            extraction,
            feed,
        }
    }

    /// Run one conversation turn for a user.
    ///
    /// On success exactly one user-role and one assistant-role message have
    /// been persisted, in that order, plus at most one agent-created memory.
    pub async fn handle_turn(&self, user_id: &str, content: &str) -> Result<Turn> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("user_id is required".into()));
        }
        if content.trim().is_empty() {
            return Err(Error::Validation("Message content cannot be empty".into()));
        }

        // The user's message is persisted before anything else; if this
        // write fails the turn aborts.
        let message = db::create_message(
            &self.db,
            CreateMessage {
                id: models::new_id(),
                user_id: user_id.to_string(),
                content: content.to_string(),
                role: MessageRole::User,
            },
        )
        .await?;

        // Memory context is best-effort: a failed read degrades to an empty
        // set instead of aborting the turn.
        let memories = match db::list_memories(&self.db, user_id).await {
            Ok(memories) => memories,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to load memories, continuing with empty context"
                );
                Vec::new()
            }
        };

        // The reply is required; a completion failure fails the turn.
        let instruction = system_instruction(&memories);
        let mut reply = self
            .llm
            .complete(
                &[Segment::system(instruction), Segment::user(content)],
                REPLY_MAX_TOKENS,
            )
            .await?;

        // Extraction and the memory write are side decisions; neither can
        // fail the turn.
        if let Some(draft) = self.extraction.extract(content, &memories).await {
            let input = CreateMemory {
                id: models::new_id(),
                user_id: user_id.to_string(),
                category: draft.category,
                content: draft.content.clone(),
                importance: AGENT_MEMORY_IMPORTANCE,
                created_by: MemoryCreator::Agent,
            };
            match db::create_memory(&self.db, input).await {
                Ok(memory) => {
                    info!(
                        user_id = %user_id,
                        category = %memory.category,
                        "Stored extracted memory"
                    );
                    self.feed.created(&memory);
                    reply.push_str(&format!("\n\nI've saved that you {}.", draft.content));
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Failed to store extracted memory");
                }
            }
        }

        let ai_message = db::create_message(
            &self.db,
            CreateMessage {
                id: models::new_id(),
                user_id: user_id.to_string(),
                content: reply,
                role: MessageRole::Assistant,
            },
        )
        .await?;

        Ok(Turn {
            message,
            ai_message,
        })
    }
}

/// Build the assistant persona instruction, interpolating the memory
/// context one `category: content` line at a time.
fn system_instruction(memories: &[Memory]) -> String {
    let context: String = memories
        .iter()
        .map(|m| format!("{}: {}", m.category, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful health coach assistant.
Consider these relevant details about the user:
{context}

IMPORTANT: When users share personal information, preferences, or goals, you should store them as memories.

Examples of information worth remembering:
- Food preferences or restrictions
- Exercise habits or preferences
- Health goals
- Allergies or dietary restrictions"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(category: &str, content: &str) -> Memory {
        Memory {
            id: models::new_id(),
            user_id: "u1".to_string(),
            category: category.to_string(),
            content: content.to_string(),
            importance: 1.0,
            created_by: "user".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_instruction_interpolates_memories() {
        let memories = vec![
            memory("Allergy", "Allergic to peanuts"),
            memory("Exercise", "Runs every morning"),
        ];
        let instruction = system_instruction(&memories);
        assert!(instruction.contains("Allergy: Allergic to peanuts\nExercise: Runs every morning"));
    }

    #[test]
    fn test_instruction_with_no_memories_keeps_persona() {
        let instruction = system_instruction(&[]);
        assert!(instruction.contains("health coach assistant"));
        assert!(instruction.contains("store them as memories"));
    }
}
