//! LLM completion service with multi-provider fallback.
//!
//! Supports Gemini, Anthropic (Claude), OpenRouter, and OpenAI with automatic
//! fallback when rate limits are hit or providers fail. Providers come from
//! environment configuration in priority order.
//!
//! A completion request is an ordered list of role-tagged segments; each
//! provider adapter maps the segments onto its own wire format.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Maximum retries per provider before fallback
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

/// Sampling temperature for conversational replies.
const TEMPERATURE: f64 = 0.7;

/// Role of a prompt segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    System,
    User,
}

/// One role-tagged segment of a completion request.
#[derive(Debug, Clone)]
pub struct Segment {
    pub role: SegmentRole,
    pub content: String,
}

impl Segment {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: SegmentRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: SegmentRole::User,
            content: content.into(),
        }
    }
}

/// Runtime provider configuration.
#[derive(Debug, Clone)]
struct RuntimeProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: String,
}

/// Service for LLM completions with multi-provider fallback.
///
/// Tries providers in priority order, automatically falling back
/// on rate limits or failures.
#[derive(Clone)]
pub struct LlmService {
    inner: Arc<LlmServiceInner>,
}

struct LlmServiceInner {
    providers: Vec<RuntimeProvider>,
    client: Client,
    /// Last error message from a completion call
    last_error: RwLock<Option<String>>,
    /// Consecutive error count
    error_count: AtomicU32,
}

/// Response from LLM API
#[derive(Debug, Deserialize)]
struct LlmResponse {
    choices: Option<Vec<Choice>>,
    candidates: Option<Vec<Candidate>>,     // Gemini format
    content: Option<Vec<AnthropicContent>>, // Anthropic format
    error: Option<LlmError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct LlmError {
    message: String,
}

impl LlmService {
    /// Create an LLM service from environment configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        let providers: Vec<RuntimeProvider> = config
            .providers
            .iter()
            .map(|p| RuntimeProvider {
                name: p.name.clone(),
                base_url: p.base_url.clone(),
                model: p.model.clone(),
                api_key: p.api_key.clone(),
            })
            .collect();

        debug!(
            providers = ?providers.iter().map(|p| &p.name).collect::<Vec<_>>(),
            "LLM service initialized from config"
        );

        Self {
            inner: Arc::new(LlmServiceInner {
                providers,
                client,
                last_error: RwLock::new(None),
                error_count: AtomicU32::new(0),
            }),
        }
    }

    /// Check if any provider is configured.
    pub fn is_available(&self) -> bool {
        !self.inner.providers.is_empty()
    }

    /// Get provider names in priority order.
    pub fn provider_names(&self) -> Vec<String> {
        self.inner.providers.iter().map(|p| p.name.clone()).collect()
    }

    /// Get error info for the status endpoint.
    pub async fn error_info(&self) -> Option<(String, u32)> {
        let error = self.inner.last_error.read().await;
        error
            .as_ref()
            .map(|msg| (msg.clone(), self.inner.error_count.load(Ordering::Relaxed)))
    }

    /// Complete a segment list with automatic provider fallback.
    pub async fn complete(&self, segments: &[Segment], max_tokens: u32) -> Result<String> {
        if self.inner.providers.is_empty() {
            return Err(Error::Llm("No LLM providers configured".to_string()));
        }

        let mut last_error = None;

        for provider in &self.inner.providers {
            match self.try_provider(provider, segments, max_tokens).await {
                Ok(response) => {
                    self.clear_error().await;
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        provider = %provider.name,
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        let error_msg = last_error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "All providers failed".to_string());
        self.record_error(&error_msg).await;

        Err(last_error.unwrap_or_else(|| Error::Llm("All providers failed".to_string())))
    }

    /// Record an error from a completion call.
    async fn record_error(&self, error: &str) {
        let mut last_error = self.inner.last_error.write().await;
        *last_error = Some(error.to_string());
        drop(last_error);

        self.inner.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Clear error state after a successful call.
    async fn clear_error(&self) {
        let mut last_error = self.inner.last_error.write().await;
        *last_error = None;
        drop(last_error);

        self.inner.error_count.store(0, Ordering::Relaxed);
    }

    /// Try a specific provider with retries.
    async fn try_provider(
        &self,
        provider: &RuntimeProvider,
        segments: &[Segment],
        max_tokens: u32,
    ) -> Result<String> {
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);

        for attempt in 0..MAX_RETRIES {
            match self.call_provider(provider, segments, max_tokens).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < MAX_RETRIES - 1 {
                        debug!(
                            provider = %provider.name,
                            attempt,
                            delay_ms = delay.as_millis(),
                            "Retrying after error"
                        );
                        sleep(delay).await;
                        delay *= 2;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(Error::Llm(format!(
            "Provider {} failed after {} retries",
            provider.name, MAX_RETRIES
        )))
    }

    /// Check if an error is retryable
    fn is_retryable(error: &Error) -> bool {
        matches!(error, Error::RateLimitExceeded)
            || error.to_string().contains("rate limit")
            || error.to_string().contains("429")
            || error.to_string().contains("503")
            || error.to_string().contains("timeout")
    }

    /// Make the actual API call to a provider.
    async fn call_provider(
        &self,
        provider: &RuntimeProvider,
        segments: &[Segment],
        max_tokens: u32,
    ) -> Result<String> {
        debug!(
            provider = %provider.name,
            model = %provider.model,
            "Calling LLM provider"
        );

        let (url, body) = match provider.name.as_str() {
            "gemini" => Self::build_gemini_request(provider, segments, max_tokens),
            "anthropic" => Self::build_anthropic_request(provider, segments, max_tokens),
            _ => Self::build_openai_request(provider, segments, max_tokens),
        };

        let mut request = self
            .inner
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        // Add authentication header based on provider
        request = match provider.name.as_str() {
            // Gemini carries the key in the URL
            "gemini" => request,
            "anthropic" => request
                .header("x-api-key", &provider.api_key)
                .header("anthropic-version", "2023-06-01"),
            _ => request.header("Authorization", format!("Bearer {}", provider.api_key)),
        };

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Llm(format!("Failed to read response: {}", e)))?;

        if status.as_u16() == 429 {
            return Err(Error::RateLimitExceeded);
        }

        if !status.is_success() {
            return Err(Error::Llm(format!(
                "Provider returned {}: {}",
                status, text
            )));
        }

        Self::parse_response(&provider.name, &text)
    }

    /// Build request for Gemini API
    fn build_gemini_request(
        provider: &RuntimeProvider,
        segments: &[Segment],
        max_tokens: u32,
    ) -> (String, Value) {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            provider.base_url, provider.model, provider.api_key
        );

        let system_text = join_segments(segments, SegmentRole::System);
        let contents: Vec<Value> = segments
            .iter()
            .filter(|s| s.role == SegmentRole::User)
            .map(|s| json!({"role": "user", "parts": [{"text": s.content}]}))
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": TEMPERATURE
            }
        });

        if !system_text.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system_text}]});
        }

        (url, body)
    }

    /// Build request for OpenAI-compatible APIs (OpenAI, OpenRouter)
    fn build_openai_request(
        provider: &RuntimeProvider,
        segments: &[Segment],
        max_tokens: u32,
    ) -> (String, Value) {
        let url = format!("{}/chat/completions", provider.base_url);

        let messages: Vec<Value> = segments
            .iter()
            .map(|s| {
                let role = match s.role {
                    SegmentRole::System => "system",
                    SegmentRole::User => "user",
                };
                json!({"role": role, "content": s.content})
            })
            .collect();

        let body = json!({
            "model": provider.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": TEMPERATURE
        });

        (url, body)
    }

    /// Build request for Anthropic Claude API
    fn build_anthropic_request(
        provider: &RuntimeProvider,
        segments: &[Segment],
        max_tokens: u32,
    ) -> (String, Value) {
        let url = format!("{}/messages", provider.base_url);

        let system_text = join_segments(segments, SegmentRole::System);
        let messages: Vec<Value> = segments
            .iter()
            .filter(|s| s.role == SegmentRole::User)
            .map(|s| json!({"role": "user", "content": s.content}))
            .collect();

        let mut body = json!({
            "model": provider.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": TEMPERATURE
        });

        if !system_text.is_empty() {
            body["system"] = json!(system_text);
        }

        (url, body)
    }

    /// Parse response from different API formats
    fn parse_response(provider: &str, text: &str) -> Result<String> {
        let response: LlmResponse = serde_json::from_str(text)
            .map_err(|e| Error::Llm(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(Error::Llm(error.message));
        }

        // Try Anthropic format first
        if let Some(content) = response.content {
            if let Some(content_block) = content.first() {
                return Ok(content_block.text.clone());
            }
        }

        // Try Gemini format
        if let Some(candidates) = response.candidates {
            if let Some(candidate) = candidates.first() {
                if let Some(part) = candidate.content.parts.first() {
                    return Ok(part.text.clone());
                }
            }
        }

        // Try OpenAI format
        if let Some(choices) = response.choices {
            if let Some(choice) = choices.first() {
                if let Some(message) = &choice.message {
                    return Ok(message.content.clone());
                }
                if let Some(text) = &choice.text {
                    return Ok(text.clone());
                }
            }
        }

        Err(Error::Llm(format!("No content in {} response", provider)))
    }
}

/// Concatenate all segments of a role into one block.
fn join_segments(segments: &[Segment], role: SegmentRole) -> String {
    segments
        .iter()
        .filter(|s| s.role == role)
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
