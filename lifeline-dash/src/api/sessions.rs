//! Dashboard session and caller ranking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::ApiResult;
use crate::backend::Backend;
use crate::detail::DetailView;
use crate::live::DashboardSession;
use crate::ranking::{RankingView, SortKey, SourceFilter};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub view: RankingView,
}

#[derive(Debug, Deserialize)]
pub struct SortRequest {
    pub key: SortKey,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub filter: SourceFilter,
}

#[derive(Debug, Deserialize)]
pub struct SelectCallerRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct CallerSelected {
    pub view: RankingView,
    pub detail: DetailView,
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let backend: Arc<dyn Backend> = state.backend.clone();
    let session = DashboardSession::mount(backend, state.questions.clone(), state.event_capacity).await;
    let created = SessionCreated {
        session_id: session.id(),
        view: session.ranking().view(),
    };
    state.sessions.insert(session).await;

    info!("Created session {}", created.session_id);
    (StatusCode::CREATED, Json(created))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/:id/callers
pub async fn get_callers(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<RankingView>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.ranking().view()))
}

/// POST /api/sessions/:id/sort
pub async fn set_sort(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SortRequest>,
) -> ApiResult<Json<RankingView>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.sort_by(req.key)))
}

/// POST /api/sessions/:id/filter
pub async fn set_filter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<RankingView>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.set_filter(req.filter)))
}

/// POST /api/sessions/:id/select
pub async fn select_caller(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectCallerRequest>,
) -> ApiResult<Json<CallerSelected>> {
    let session = state.sessions.get(id).await?;
    let detail = session.select_caller(&req.phone_number).await?;
    Ok(Json(CallerSelected {
        view: session.ranking().view(),
        detail,
    }))
}

/// POST /api/sessions/:id/refresh
pub async fn refresh(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<RankingView>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.refresh().await?))
}
