//! # ll-api Handlers
//!
//! Thin adapters between the HTTP surface and the [`AiGateway`] port.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use ll_core::error::AppError;
use ll_core::models::{ChatTurn, ProcessedFile, VerifiedIdentity};
use ll_core::traits::{AiGateway, TokenVerifier};
use serde::{Deserialize, Serialize};

/// State shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn AiGateway>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// An HTTP failure rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Maps `err` to its status. Server-side failures are logged and replaced
    /// with `public` so gateway details never reach the caller.
    fn from_app(err: AppError, public: &str) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "{public}");
            Self::new(status, public)
        } else {
            Self::new(status, err.to_string())
        }
    }
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
        AppError::InvalidToken(_) => StatusCode::FORBIDDEN,
        AppError::Validation(_) | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        AppError::AlreadyExists(_) => StatusCode::CONFLICT,
        AppError::NotFound(..) => StatusCode::NOT_FOUND,
        AppError::RemoteService(_) | AppError::Storage(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Treats absent and empty strings alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFileRequest {
    pub file_data: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub history: Option<Vec<ChatTurn>>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub text: String,
}

/// Extracts text and tags from an uploaded document or recording.
pub async fn process_file(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    payload: Result<Json<ProcessFileRequest>, JsonRejection>,
) -> Result<Json<ProcessedFile>, ApiError> {
    let Json(req) = payload?;
    let (Some(file_data), Some(mime_type)) = (present(req.file_data), present(req.mime_type))
    else {
        return Err(ApiError::bad_request("Missing fileData or mimeType"));
    };

    tracing::info!(uid = %identity.uid, %mime_type, "processing file");
    let processed = state
        .gateway
        .process_file(&file_data, &mime_type)
        .await
        .map_err(|e| ApiError::from_app(e, "Failed to process file on the server."))?;
    Ok(Json(processed))
}

pub async fn summarize(
    State(state): State<AppState>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let Json(req) = payload?;
    let text = present(req.text).ok_or_else(|| ApiError::bad_request("Missing text to summarize"))?;

    let summary = state
        .gateway
        .summarize(&text)
        .await
        .map_err(|e| ApiError::from_app(e, "Failed to summarize text on the server."))?;
    Ok(Json(SummarizeResponse { summary }))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    let (Some(history), Some(message)) = (req.history, present(req.message)) else {
        return Err(ApiError::bad_request("Missing history or message for chat"));
    };

    let text = state
        .gateway
        .chat(&history, &message)
        .await
        .map_err(|e| ApiError::from_app(e, "Failed to get chat response from the server."))?;
    Ok(Json(ChatResponse { text }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
