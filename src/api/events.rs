//! Server-Sent Events endpoint for memory change notifications.
//!
//! Streams one user's memory change events so clients can refetch the
//! collection whenever it changes (push notification, pull refetch).

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::AppState;

/// Build the events router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/:id/events", get(memory_events))
}

/// SSE stream of memory changes for one user.
///
/// GET /api/memories/:user_id/events
async fn memory_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    debug!(user_id = %user_id, "SSE connection established");

    let receiver = state.feed.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(move |result| {
        let user_id = user_id.clone();
        async move {
            match result {
                Ok(event) if event.user_id() == user_id => {
                    match serde_json::to_string(&event) {
                        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize memory event");
                            None
                        }
                    }
                }
                // Another user's change
                Ok(_) => None,
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(count)) => {
                    warn!(count, "Memory event stream lagged, events dropped");
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("heartbeat"),
    )
}
