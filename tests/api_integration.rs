//! API Integration Tests for the Tend Server
//!
//! Exercises the REST API end-to-end using axum-test, with an in-memory
//! SQLite database and wiremock standing in for the completion provider.

mod common;

use axum::http::StatusCode;
use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};
use tend::api;
use tend::config::LlmConfig;
use tend::AppState;
use wiremock::MockServer;

use common::{
    build_test_state, mock_provider_config, mount_decision, mount_decision_failure, mount_reply,
    setup_test_db,
};

fn test_server(state: AppState) -> TestServer {
    let app: Router = api::routes().with_state(state);
    TestServer::new(app).expect("Failed to start test server")
}

/// Spin up a server whose completion provider is the given mock.
async fn server_with_mock(mock: &MockServer) -> TestServer {
    let db = setup_test_db().await;
    test_server(build_test_state(db, mock_provider_config(mock)))
}

// ============================================================================
// Conversation turns
// ============================================================================

#[tokio::test]
async fn test_turn_persists_user_then_assistant_message() {
    let mock = MockServer::start().await;
    mount_reply(&mock, "Hello! How can I help?").await;
    mount_decision(&mock, "no_memory_needed").await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "Hi there" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["message"]["role"], "user");
    assert_eq!(body["message"]["content"], "Hi there");
    assert_eq!(body["aiMessage"]["role"], "assistant");
    assert_eq!(body["aiMessage"]["content"], "Hello! How can I help?");

    // History lists the two messages in creation order
    let history: Value = server.get("/api/chat/u1").await.json();
    let messages = history.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn test_turn_stores_extracted_memory_and_acknowledges() {
    let mock = MockServer::start().await;
    mount_reply(&mock, "Noted!").await;
    mount_decision(
        &mock,
        r#"{"category": "Allergy", "content": "Allergic to peanuts"}"#,
    )
    .await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "I'm allergic to peanuts" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    let reply = body["aiMessage"]["content"].as_str().unwrap();
    assert!(reply.starts_with("Noted!"));
    assert!(reply.ends_with("I've saved that you Allergic to peanuts."));

    let memories: Value = server.get("/api/memories/u1").await.json();
    let memories = memories.as_array().unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0]["category"], "Allergy");
    assert_eq!(memories[0]["content"], "Allergic to peanuts");
    assert_eq!(memories[0]["created_by"], "agent");
    assert_eq!(memories[0]["importance"], 1.0);
}

#[tokio::test]
async fn test_no_memory_sentinel_leaves_reply_untouched() {
    let mock = MockServer::start().await;
    mount_reply(&mock, "Keep it up!").await;
    mount_decision(&mock, "no_memory_needed").await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "Thanks!" }))
        .await;

    let body: Value = response.json();
    assert_eq!(body["aiMessage"]["content"], "Keep it up!");

    let memories: Value = server.get("/api/memories/u1").await.json();
    assert!(memories.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_extraction_category_is_never_persisted() {
    let mock = MockServer::start().await;
    mount_reply(&mock, "Sorry to hear that.").await;
    mount_decision(&mock, r#"{"category": "Mood", "content": "Feels tired"}"#).await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "I feel tired" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["aiMessage"]["content"], "Sorry to hear that.");

    let memories: Value = server.get("/api/memories/u1").await.json();
    assert!(memories.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_extraction_failure_does_not_fail_turn() {
    let mock = MockServer::start().await;
    mount_reply(&mock, "Good choice!").await;
    mount_decision_failure(&mock).await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "I love walnuts" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["aiMessage"]["content"], "Good choice!");

    let memories: Value = server.get("/api/memories/u1").await.json();
    assert!(memories.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reply_failure_keeps_the_user_message() {
    // No providers configured: the reply call fails, the turn aborts, but
    // the user message was persisted first. Accepted partial state.
    let db = setup_test_db().await;
    let server = test_server(build_test_state(db, LlmConfig::default()));

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "Hello?" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("LLM"));

    let history: Value = server.get("/api/chat/u1").await.json();
    let messages = history.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn test_memory_read_failure_degrades_to_empty_context() {
    let mock = MockServer::start().await;
    mount_reply(&mock, "Hello!").await;
    mount_decision(&mock, "no_memory_needed").await;

    let db = setup_test_db().await;
    // Poison the memory read path; the turn should still complete.
    sqlx::query("DROP TABLE memories")
        .execute(&db)
        .await
        .unwrap();

    let server = test_server(build_test_state(db, mock_provider_config(&mock)));

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "Hi" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let history: Value = server.get("/api/chat/u1").await.json();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_message_is_rejected_before_any_write() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "   " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let history: Value = server.get("/api/chat/u1").await.json();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_context_reaches_the_completion_call() {
    let mock = MockServer::start().await;
    // The reply mock requires the stored memory to appear in the request
    // body, interpolated as a "category: content" line.
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/chat/completions"))
        .and(wiremock::matchers::body_string_contains(
            "Diet: Vegetarian",
        ))
        .and(wiremock::matchers::body_string_contains("health coach"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(common::completion_body("Plenty of options!")),
        )
        .mount(&mock)
        .await;
    mount_decision(&mock, "no_memory_needed").await;
    let server = server_with_mock(&mock).await;

    server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Diet", "content": "Vegetarian" }))
        .await;

    let response = server
        .post("/api/chat")
        .json(&json!({ "user_id": "u1", "content": "What should I cook?" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["aiMessage"]["content"], "Plenty of options!");
}

// ============================================================================
// Memory CRUD
// ============================================================================

#[tokio::test]
async fn test_memory_crud_roundtrip() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    // Create
    let created: Value = server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Exercise", "content": "Runs every morning" }))
        .await
        .json();
    assert_eq!(created["created_by"], "user");
    assert_eq!(created["importance"], 1.0);
    let id = created["id"].as_str().unwrap().to_string();

    // Update
    let updated: Value = server
        .patch(&format!("/api/memories/{}", id))
        .json(&json!({ "content": "Runs every evening" }))
        .await
        .json();
    assert_eq!(updated["content"], "Runs every evening");
    assert_eq!(updated["category"], "Exercise");

    // Delete
    let deleted: Value = server.delete(&format!("/api/memories/{}", id)).await.json();
    assert_eq!(deleted["success"], true);

    // Gone from the list
    let memories: Value = server.get("/api/memories/u1").await.json();
    assert!(memories.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_memories_list_newest_first() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Diet", "content": "Vegetarian" }))
        .await;
    server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Goal", "content": "Lose 5kg" }))
        .await;

    let memories: Value = server.get("/api/memories/u1").await.json();
    let memories = memories.as_array().unwrap();
    assert_eq!(memories.len(), 2);
    assert_eq!(memories[0]["content"], "Lose 5kg");
    assert_eq!(memories[1]["content"], "Vegetarian");
}

#[tokio::test]
async fn test_create_memory_invalid_category_rejected() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Invalid", "content": "whatever" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Invalid category"));

    // Rejected before any row was written
    let memories: Value = server.get("/api/memories/u1").await.json();
    assert!(memories.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_memory_invalid_category_rejected() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let created: Value = server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Grocery", "content": "Buy oats" }))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/api/memories/{}", id))
        .json(&json!({ "category": "Snacks" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let memories: Value = server.get("/api/memories/u1").await.json();
    assert_eq!(memories[0]["category"], "Grocery");
}

#[tokio::test]
async fn test_custom_importance_is_kept() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let created: Value = server
        .post("/api/memories")
        .json(&json!({ "user_id": "u1", "category": "Goal", "content": "Run a marathon", "importance": 3 }))
        .await
        .json();
    assert_eq!(created["importance"], 3.0);
}

#[tokio::test]
async fn test_delete_missing_memory_is_not_found() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let response = server.delete("/api/memories/does-not-exist").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Agent memory route
// ============================================================================

#[tokio::test]
async fn test_agent_route_creates_agent_memory() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/memories/agent")
        .json(&json!({ "user_id": "u1", "category": "Preference", "content": "Loves walnuts" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["memory"]["created_by"], "agent");
}

#[tokio::test]
async fn test_agent_route_reports_missing_fields() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/memories/agent")
        .json(&json!({ "user_id": "u1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn test_agent_route_reports_invalid_category() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let response = server
        .post("/api/memories/agent")
        .json(&json!({ "user_id": "u1", "category": "Mood", "content": "Feels great" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Must be one of"));
}

// ============================================================================
// Health surface
// ============================================================================

#[tokio::test]
async fn test_health_and_status() {
    let mock = MockServer::start().await;
    let server = server_with_mock(&mock).await;

    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], "healthy");

    let status: Value = server.get("/status").await.json();
    assert_eq!(status["database"]["connected"], true);
    assert_eq!(status["llm"]["available"], true);
    assert_eq!(status["llm"]["providers"][0], "openai");
}
