//! Tend - Conversational Memory Backend
//!
//! Chat and memory API for a health-coaching assistant. Each conversation
//! turn persists the user's message, builds LLM context from the user's
//! memory set, obtains a reply, and runs an extraction pass that may record
//! zero or one durable categorized memories on the agent's behalf.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;
