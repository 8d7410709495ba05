//! Write side of the backend
//!
//! These endpoints stand in for the upstream analysis pipeline: every write
//! publishes change events that live sessions react to.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lifeline_common::models::{Call, Caller, CallerProfile, NewCall};

use super::{ApiError, ApiResult};
use crate::AppState;

/// PUT /api/ingest/callers/:phone
pub async fn upsert_caller(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Json(profile): Json<CallerProfile>,
) -> ApiResult<Json<Caller>> {
    Ok(Json(state.backend.upsert_caller(&phone, profile).await?))
}

/// DELETE /api/ingest/callers/:phone
pub async fn delete_caller(State(state): State<AppState>, Path(phone): Path<String>) -> ApiResult<StatusCode> {
    if state.backend.delete_caller(&phone).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("caller {}", phone)))
    }
}

/// POST /api/ingest/calls
pub async fn insert_call(
    State(state): State<AppState>,
    Json(new_call): Json<NewCall>,
) -> ApiResult<(StatusCode, Json<Call>)> {
    let call = state.backend.insert_call(new_call).await?;
    Ok((StatusCode::CREATED, Json(call)))
}
