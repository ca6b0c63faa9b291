//! Memory change feed.
//!
//! A broadcast channel that every memory write path emits into. Consumers
//! either subscribe to raw events (the SSE endpoint) or watch one user's
//! collection, receiving the refreshed newest-first list after each change
//! (push notification, pull refetch).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::db::{self, DbPool, Memory};
use crate::models;

/// Channel capacity; large enough to absorb write bursts without dropping.
const CHANNEL_CAPACITY: usize = 256;

/// A change to a user's memory set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MemoryEvent {
    Created(MemoryChange),
    Updated(MemoryChange),
    Deleted(MemoryChange),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChange {
    pub user_id: String,
    pub memory_id: String,
    pub timestamp: String,
}

impl MemoryEvent {
    /// Get the SSE event type name for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "memory:created",
            Self::Updated(_) => "memory:updated",
            Self::Deleted(_) => "memory:deleted",
        }
    }

    /// Owning user of the changed memory.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Created(c) | Self::Updated(c) | Self::Deleted(c) => &c.user_id,
        }
    }
}

/// Broadcast feed of memory changes.
#[derive(Clone)]
pub struct MemoryFeed {
    sender: broadcast::Sender<MemoryEvent>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn emit(&self, event: MemoryEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to raw change events.
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }

    /// Emit a created event for a memory.
    pub fn created(&self, memory: &Memory) {
        self.emit(MemoryEvent::Created(change(memory)));
    }

    /// Emit an updated event for a memory.
    pub fn updated(&self, memory: &Memory) {
        self.emit(MemoryEvent::Updated(change(memory)));
    }

    /// Emit a deleted event.
    pub fn deleted(&self, user_id: &str, memory_id: &str) {
        self.emit(MemoryEvent::Deleted(MemoryChange {
            user_id: user_id.to_string(),
            memory_id: memory_id.to_string(),
            timestamp: models::now(),
        }));
    }

    /// Watch a user's memory collection.
    ///
    /// Invokes `on_change` with the full newest-first collection once
    /// immediately and again after every change to that user's memories.
    /// The task ends when the feed is dropped.
    pub fn watch<F>(&self, db: DbPool, user_id: String, mut on_change: F) -> JoinHandle<()>
    where
        F: FnMut(Vec<Memory>) + Send + 'static,
    {
        let mut receiver = self.subscribe();

        tokio::spawn(async move {
            match db::list_memories(&db, &user_id).await {
                Ok(memories) => on_change(memories),
                Err(e) => warn!(user_id = %user_id, error = %e, "Initial memory fetch failed"),
            }

            loop {
                match receiver.recv().await {
                    Ok(event) if event.user_id() == user_id => {
                        match db::list_memories(&db, &user_id).await {
                            Ok(memories) => on_change(memories),
                            Err(e) => {
                                warn!(user_id = %user_id, error = %e, "Memory refetch failed")
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "Memory feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

fn change(memory: &Memory) -> MemoryChange {
    MemoryChange {
        user_id: memory.user_id.clone(),
        memory_id: memory.id.clone(),
        timestamp: models::now(),
    }
}
