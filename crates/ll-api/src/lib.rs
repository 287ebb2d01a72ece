//! # ll-api
//!
//! The Living Library backend proxy: the only place the Gemini key lives.

pub mod handlers;
pub mod middleware;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

pub use handlers::{ApiError, AppState};

/// Upload payloads are base64 documents and recordings.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Builds the proxy router.
///
/// Only `/api/process-file` sits behind bearer verification; summaries and
/// chat are open.
pub fn router(state: AppState, body_limit: usize) -> Router {
    let protected = Router::new()
        .route("/api/process-file", post(handlers::process_file))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_bearer,
        ));

    Router::new()
        .merge(protected)
        .route("/api/summarize", post(handlers::summarize))
        .route("/api/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
}
