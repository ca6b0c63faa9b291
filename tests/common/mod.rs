//! Common test utilities and helpers.

use std::sync::Arc;

use serde_json::{json, Value};
use tend::config::{LlmConfig, LlmProvider};
use tend::db::{self, DbPool, PoolConfig};
use tend::services::{ChatService, ExtractionService, LlmService, MemoryFeed};
use tend::AppState;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create a test database with the schema applied.
///
/// A single connection keeps the in-memory database consistent.
pub async fn setup_test_db() -> DbPool {
    let pool = db::create_pool_with_config(":memory:", PoolConfig::test())
        .await
        .expect("Failed to create test database");
    db::initialize_schema(&pool)
        .await
        .expect("Failed to apply schema");
    pool
}

/// Build an AppState with explicitly injected services.
pub fn build_test_state(db: DbPool, llm_config: LlmConfig) -> AppState {
    let llm = Arc::new(LlmService::from_config(&llm_config));
    let feed = MemoryFeed::new();
    let extraction = ExtractionService::new(llm.clone());
    let chat = ChatService::new(db.clone(), llm.clone(), extraction, feed.clone());

    AppState {
        db,
        llm,
        chat,
        feed,
    }
}

/// LLM configuration pointing the OpenAI-format adapter at a mock server.
pub fn mock_provider_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        providers: vec![LlmProvider {
            name: "openai".to_string(),
            base_url: server.uri(),
            model: "gpt-4".to_string(),
            api_key: "test-key".to_string(),
            priority: 1,
        }],
    }
}

/// OpenAI-format completion response body.
pub fn completion_body(content: &str) -> Value {
    json!({ "choices": [{ "message": { "content": content } }] })
}

/// Mount a mock for the conversational reply call.
///
/// The reply request is the only one carrying the health-coach persona,
/// which keeps the two completion mocks mutually exclusive.
pub async fn mount_reply(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("health coach"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(reply)))
        .mount(server)
        .await;
}

/// Mount a mock for the memory decision call.
pub async fn mount_decision(server: &MockServer, decision: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("decide if a memory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(decision)))
        .mount(server)
        .await;
}

/// Mount a failing mock for the memory decision call.
pub async fn mount_decision_failure(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("decide if a memory"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(server)
        .await;
}
