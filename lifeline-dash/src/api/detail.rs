//! Call detail endpoints for a session's selected caller

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::detail::DetailView;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SelectCallRequest {
    pub call_id: i64,
}

/// GET /api/sessions/:id/detail
pub async fn get_detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<DetailView>> {
    let session = state.sessions.get(id).await?;
    let detail = session
        .detail()
        .ok_or_else(|| ApiError::NotFound("no caller selected".to_string()))?;
    Ok(Json(detail.view()))
}

/// POST /api/sessions/:id/detail/select
pub async fn select_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectCallRequest>,
) -> ApiResult<Json<DetailView>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.select_call(req.call_id)?))
}

/// POST /api/sessions/:id/detail/retry
pub async fn retry_detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<DetailView>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.retry_detail().await?))
}
