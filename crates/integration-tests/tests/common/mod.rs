#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use ll_api::AppState;
use ll_auth_jwt::{JwtIssuer, JwtVerifier, LocalIdentityProvider};
use ll_core::error::{AppError, Result};
use ll_core::models::{NewStory, ProcessedFile, UploadedFile};
use ll_core::traits::{FileProcessor, KvStore, MockAiGateway};
use serde_json::Value;
use tokio::sync::Notify;

pub const SECRET: &[u8] = b"integration-secret";
pub const EMAIL: &str = "reader@example.com";
pub const PASSWORD: &str = "correct horse";

pub fn identity(kv: Arc<dyn KvStore>) -> Arc<LocalIdentityProvider> {
    Arc::new(LocalIdentityProvider::new(kv, JwtIssuer::from_secret(SECRET, 3600)))
}

pub fn proxy_app(gateway: MockAiGateway) -> Router {
    ll_api::router(
        AppState {
            gateway: Arc::new(gateway),
            verifier: Arc::new(JwtVerifier::from_secret(SECRET)),
        },
        ll_api::DEFAULT_BODY_LIMIT,
    )
}

pub fn post_json(uri: &str, body: Value, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn notes_upload() -> NewStory {
    NewStory {
        title: "My Notes".to_string(),
        category: "History".to_string(),
        short_description: "Notes from grandma".to_string(),
        file: UploadedFile::new("notes.pdf", "application/pdf", b"%PDF-1.4 notes".to_vec()),
    }
}

pub fn extracted() -> ProcessedFile {
    ProcessedFile {
        content: "Extracted text".to_string(),
        tags: vec!["a".to_string(), "b".to_string()],
    }
}

/// A processor that parks every call until released.
///
/// `result` of `None` makes released calls fail.
pub struct GatedProcessor {
    pub started: Notify,
    pub release: Notify,
    result: Option<ProcessedFile>,
    calls: AtomicUsize,
}

impl GatedProcessor {
    pub fn new(result: Option<ProcessedFile>) -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Notify::new(),
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileProcessor for GatedProcessor {
    async fn process_file(&self, _file: &UploadedFile, _token: &str) -> Result<ProcessedFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        self.result
            .clone()
            .ok_or_else(|| AppError::RemoteService("Failed to process file on the server.".to_string()))
    }
}

/// Answers immediately, counting calls.
pub struct InstantProcessor {
    result: Option<ProcessedFile>,
    calls: AtomicUsize,
}

impl InstantProcessor {
    pub fn new(result: Option<ProcessedFile>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileProcessor for InstantProcessor {
    async fn process_file(&self, _file: &UploadedFile, _token: &str) -> Result<ProcessedFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .ok_or_else(|| AppError::RemoteService("Failed to process file on the server.".to_string()))
    }
}
