//! Data models for Tend.
//!
//! Closed enumerations for memory categories, creators, and message roles,
//! plus the id/time helpers shared by the db layer.

mod memory;
mod message;

pub use memory::*;
pub use message::*;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp as RFC3339 with millisecond precision.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
