//! Server-Sent Events stream of dashboard updates

use axum::{
    extract::{Path, State},
    response::{sse::Event, Sse},
};
use futures::stream::Stream;
use lifeline_common::sse::broadcast_sse_stream;
use std::convert::Infallible;
use uuid::Uuid;

use super::ApiResult;
use crate::AppState;

/// GET /api/sessions/:id/events
pub async fn event_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = state.sessions.get(id).await?;
    Ok(broadcast_sse_stream("lifeline-dash", session.subscribe_events()))
}
