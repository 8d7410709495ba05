//! HTTP API handlers for lifeline-dash

pub mod detail;
pub mod health;
pub mod ingest;
pub mod sessions;
pub mod sse;

pub use detail::{get_detail, retry_detail, select_call};
pub use health::health_routes;
pub use ingest::{delete_caller, insert_call, upsert_caller};
pub use sessions::{create_session, delete_session, get_callers, refresh, select_caller, set_filter, set_sort};
pub use sse::event_stream;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// API errors, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// A newer request on the same session won
    Conflict(String),
    /// The backend could not be read
    BadGateway(String),
    Internal(String),
}

impl From<lifeline_common::Error> for ApiError {
    fn from(e: lifeline_common::Error) -> Self {
        use lifeline_common::Error;
        match e {
            Error::NotFound(what) => ApiError::NotFound(what),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Superseded(what) => ApiError::Conflict(format!("{} was superseded", what)),
            Error::Fetch(msg) => ApiError::BadGateway(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {}", what)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => {
                warn!("Backend read failed: {}", msg);
                (StatusCode::BAD_GATEWAY, format!("Backend unavailable: {}", msg))
            }
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
