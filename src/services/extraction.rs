//! Memory extraction engine.
//!
//! Decides whether a user utterance should be recorded as a durable memory.
//! Extraction is a best-effort side decision: provider errors, malformed
//! responses, out-of-set categories, and empty content all degrade to
//! "no memory" rather than failing the turn, which is why the result is an
//! `Option` and not a `Result`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::llm::{LlmService, Segment};
use crate::db::Memory;
use crate::models::MemoryCategory;

/// Sentinel the model returns when no memory should be recorded.
const NO_MEMORY_SENTINEL: &str = "no_memory_needed";

/// Token budget for the decision call.
const DECISION_MAX_TOKENS: u32 = 256;

/// A validated category/content pair ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDraft {
    pub category: MemoryCategory,
    pub content: String,
}

/// Service that turns an utterance into zero-or-one new memory.
#[derive(Clone)]
pub struct ExtractionService {
    llm: Arc<LlmService>,
}

impl ExtractionService {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }

    /// Decide whether `utterance` should produce a new memory.
    ///
    /// Existing memories are interpolated into the instruction as context
    /// only; no deduplication is enforced against them.
    pub async fn extract(&self, utterance: &str, existing: &[Memory]) -> Option<MemoryDraft> {
        let instruction = decision_instruction(existing);
        let segments = [Segment::system(instruction), Segment::user(utterance)];

        let raw = match self.llm.complete(&segments, DECISION_MAX_TOKENS).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Memory decision call failed, skipping extraction");
                return None;
            }
        };

        let draft = parse_decision(&raw);
        if draft.is_none() && raw.trim() != NO_MEMORY_SENTINEL {
            debug!(raw = %raw, "Memory decision did not yield a usable memory");
        }
        draft
    }
}

/// Build the decision instruction, interpolating the user's current memories.
fn decision_instruction(existing: &[Memory]) -> String {
    let known: String = existing
        .iter()
        .map(|m| format!("{}: {}", m.category, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Your task is to decide if a memory should be created from the user's message.

The user's existing memories:
{known}

If a memory should be created, you MUST respond with ONLY a JSON object in this format:
{{
  "category": "one_of_valid_categories",
  "content": "clear_description"
}}

If no memory is needed, respond with exactly: "no_memory_needed"

Valid categories are: ["Allergy", "Preference", "Diet", "Exercise", "Goal", "Grocery"]

DO NOT include any other text or explanation in your response.
DO NOT use markdown formatting.
ONLY return either the JSON object or "no_memory_needed"."#
    )
}

/// Parse the raw decision response into a validated draft.
///
/// Parsing is lenient: it is only attempted when the response contains an
/// opening brace, and any malformed or out-of-set result maps to `None`.
fn parse_decision(raw: &str) -> Option<MemoryDraft> {
    if !raw.contains('{') {
        return None;
    }

    let json = extract_json(raw)?;

    let category = json
        .get("category")
        .and_then(Value::as_str)
        .and_then(MemoryCategory::from_str)?;

    let content = json.get("content").and_then(Value::as_str)?.trim();
    if content.is_empty() {
        return None;
    }

    Some(MemoryDraft {
        category,
        content: content.to_string(),
    })
}

/// Pull a JSON object out of raw completion text.
///
/// Handles bare objects, objects wrapped in prose, and fenced code blocks
/// by matching braces from the first `{`.
fn extract_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&text[start..start + i + 1]).ok();
                }
            }
            _ => {}
        }
    }
    None
}
