//! # AppError
//!
//! Centralized error handling for the Living Library crates.
//! Every store mutator, proxy handler, and adapter reports through this type.

use thiserror::Error;

use crate::models::StoryStatus;

/// The primary error type for all ll-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// The operation needs a signed-in session (or a bearer token was absent)
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// A bearer token was present but failed verification
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Missing or malformed input (e.g., empty title, unsupported file type)
    #[error("validation error: {0}")]
    Validation(String),

    /// The AI gateway, the proxy, or the network between them failed
    #[error("remote service error: {0}")]
    RemoteService(String),

    /// Duplicate write that is absorbed by callers (e.g., a second report)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Resource not found (e.g., Story)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// A status change that would move a story backwards
    #[error("cannot move story from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: StoryStatus, to: StoryStatus },

    /// Persistence failure (quota, serialization, I/O)
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn login_required(action: &str) -> Self {
        AppError::AuthenticationRequired(format!("user must be logged in to {action}"))
    }
}

/// A specialized Result type for Living Library logic.
pub type Result<T> = std::result::Result<T, AppError>;
