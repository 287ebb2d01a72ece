//! ll-api/src/middleware.rs Middleware
//!
//! Bearer-token verification plus the CORS and tracing layers.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{ApiError, AppState};

/// Verifies `Authorization: Bearer <token>` and stores the resulting
/// [`ll_core::models::VerifiedIdentity`] in the request extensions.
///
/// A missing or non-bearer header is a 401; a token the verifier rejects is a
/// 403. Either way the request never reaches the handler.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized: No token provided."))?;

    let identity = state.verifier.verify(token).await.map_err(|e| {
        tracing::warn!(error = %e, "error verifying identity token");
        ApiError::new(StatusCode::FORBIDDEN, "Forbidden: Invalid token.")
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600))
}

pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
