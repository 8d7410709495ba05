//! lifeline-dash library - crisis-line monitoring dashboard service
//!
//! Ranks callers by urgency or recency, reconciles a selected caller's call
//! history with live inserts, and streams both views to clients over SSE.

use axum::Router;
use std::sync::Arc;

pub mod api;
pub mod backend;
pub mod detail;
pub mod live;
pub mod ranking;
pub mod ticket;

use backend::SqliteBackend;
use detail::QuestionSet;
use live::SessionRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<SqliteBackend>,
    pub sessions: Arc<SessionRegistry>,
    pub questions: Arc<QuestionSet>,
    /// Buffer size of each session's SSE broadcast channel
    pub event_capacity: usize,
}

impl AppState {
    pub fn new(backend: SqliteBackend, questions: QuestionSet, event_capacity: usize) -> Self {
        Self {
            backend: Arc::new(backend),
            sessions: Arc::new(SessionRegistry::new()),
            questions: Arc::new(questions),
            event_capacity,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let sessions = Router::new()
        .route("/api/sessions", post(api::create_session))
        .route("/api/sessions/:id", axum::routing::delete(api::delete_session))
        .route("/api/sessions/:id/callers", get(api::get_callers))
        .route("/api/sessions/:id/sort", post(api::set_sort))
        .route("/api/sessions/:id/filter", post(api::set_filter))
        .route("/api/sessions/:id/select", post(api::select_caller))
        .route("/api/sessions/:id/refresh", post(api::refresh))
        .route("/api/sessions/:id/detail", get(api::get_detail))
        .route("/api/sessions/:id/detail/select", post(api::select_call))
        .route("/api/sessions/:id/detail/retry", post(api::retry_detail))
        .route("/api/sessions/:id/events", get(api::event_stream));

    let ingest = Router::new()
        .route(
            "/api/ingest/callers/:phone",
            put(api::upsert_caller).delete(api::delete_caller),
        )
        .route("/api/ingest/calls", post(api::insert_call));

    Router::new()
        .merge(sessions)
        .merge(ingest)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
