//! Server-Sent Events (SSE) utilities
//!
//! Turns a broadcast channel of serializable events into an axum SSE response.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

/// Events that know their SSE `event:` name
pub trait SseEventName {
    fn sse_name(&self) -> &'static str;
}

/// Create an SSE stream from a broadcast receiver
///
/// Starts with a `ConnectionStatus` event, then forwards every event as JSON
/// under its [`SseEventName`]. Lagged receivers log and keep going; the client
/// is expected to refetch its view.
pub fn broadcast_sse_stream<T>(
    service_name: &'static str,
    rx: broadcast::Receiver<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + SseEventName + Clone + Send + 'static,
{
    debug!("New SSE client connected to {}", service_name);

    let connected = futures::stream::once(async {
        Ok::<Event, Infallible>(Event::default().event("ConnectionStatus").data("connected"))
    });

    let events = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) => match Event::default().event(event.sse_name()).json_data(&event) {
                Ok(sse_event) => Some(Ok(sse_event)),
                Err(e) => {
                    warn!("{}: failed to serialize SSE event: {}", service_name, e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!("{}: SSE client lagged, {} events dropped", service_name, missed);
                None
            }
        }
    });

    Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
