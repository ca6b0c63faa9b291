//! Configuration management for Tend.
//!
//! Loads configuration from environment variables with support for
//! multiple LLM providers with fallback priority.

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub providers: Vec<LlmProvider>,
}

#[derive(Debug, Clone)]
pub struct LlmProvider {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub priority: u8,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "3000").parse().expect("Invalid PORT"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/tend.db"),
            },
            llm: LlmConfig {
                providers: Self::parse_llm_providers(),
            },
        }
    }

    /// Parse LLM providers from environment.
    /// Supports Gemini, Anthropic, OpenRouter, and OpenAI with automatic fallback ordering.
    fn parse_llm_providers() -> Vec<LlmProvider> {
        let mut providers = Vec::new();

        // Gemini (priority 1 - free tier)
        if let Ok(api_key) = env::var("GOOGLE_API_KEY") {
            providers.push(LlmProvider {
                name: "gemini".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
                api_key,
                priority: 1,
            });
        }

        // Anthropic/Claude (priority 2)
        if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
            providers.push(LlmProvider {
                name: "anthropic".to_string(),
                base_url: "https://api.anthropic.com/v1".to_string(),
                model: env_or("ANTHROPIC_MODEL", "claude-3-5-haiku-20241022"),
                api_key,
                priority: 2,
            });
        }

        // OpenRouter (priority 3)
        if let Ok(api_key) = env::var("OPENROUTER_API_KEY") {
            providers.push(LlmProvider {
                name: "openrouter".to_string(),
                base_url: "https://openrouter.ai/api/v1".to_string(),
                model: env_or("OPENROUTER_MODEL", "meta-llama/llama-3-8b-instruct:free"),
                api_key,
                priority: 3,
            });
        }

        // OpenAI (priority 4)
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            providers.push(LlmProvider {
                name: "openai".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: env_or("OPENAI_MODEL", "gpt-4"),
                api_key,
                priority: 4,
            });
        }

        // Sort by priority
        providers.sort_by_key(|p| p.priority);
        providers
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
