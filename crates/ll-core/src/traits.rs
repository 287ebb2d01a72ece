//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be wired into the client store
//! or the proxy binary.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatTurn, ProcessedFile, Session, UploadedFile, VerifiedIdentity};

/// Durable key-value slots holding opaque JSON blobs.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the stored value, or `None` if the slot was never written.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Replaces the slot's value.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Deletes the slot. Removing a missing slot is not an error.
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Credential management and token issuance on the client side.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_out(&self) -> Result<()>;

    /// The active session, if any.
    fn current_session(&self) -> Option<Session>;

    /// A fresh identity token for the active session.
    async fn id_token(&self) -> Result<String>;

    /// Changes the display name of the active session's account.
    async fn update_display_name(&self, name: &str) -> Result<()>;
}

/// Server-side verification of identity tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity>;
}

/// The remote generative-AI service the proxy forwards to.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Extracts (or transcribes) text from base64 file bytes and tags it.
    async fn process_file(&self, file_data: &str, mime_type: &str) -> Result<ProcessedFile>;
    async fn summarize(&self, text: &str) -> Result<String>;
    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String>;
}

/// Client-side access to the proxy's authenticated file processing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FileProcessor: Send + Sync {
    async fn process_file(&self, file: &UploadedFile, token: &str) -> Result<ProcessedFile>;
}

/// Client-side access to the proxy's unauthenticated assistant operations.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String>;
}
