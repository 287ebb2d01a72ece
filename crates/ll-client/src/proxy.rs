//! Reqwest client for the Living Library proxy.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ll_core::error::{AppError, Result};
use ll_core::models::{ChatTurn, ProcessedFile, UploadedFile};
use ll_core::traits::{AssistantBackend, FileProcessor};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessFileBody<'a> {
    file_data: String,
    mime_type: &'a str,
}

#[derive(Serialize)]
struct SummarizeBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    history: &'a [ChatTurn],
    message: &'a str,
}

#[derive(Deserialize)]
struct SummaryReply {
    summary: String,
}

#[derive(Deserialize)]
struct ChatReply {
    text: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

pub struct ProxyClient {
    client: Client,
    /// API root, e.g. `http://localhost:3001/api/`.
    base_url: Url,
}

impl ProxyClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Validation(format!("invalid proxy url: {e}")))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorReply>()
                .await
                .map(|reply| reply.error)
                .unwrap_or_else(|_| format!("proxy returned {status}"));
            return Err(match status {
                StatusCode::UNAUTHORIZED => AppError::AuthenticationRequired(message),
                StatusCode::FORBIDDEN => AppError::InvalidToken(message),
                StatusCode::BAD_REQUEST => AppError::Validation(message),
                _ => AppError::RemoteService(message),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::RemoteService(format!("invalid proxy payload: {e}")))
    }
}

fn transport(e: reqwest::Error) -> AppError {
    AppError::RemoteService(format!("proxy unreachable: {e}"))
}

#[async_trait]
impl FileProcessor for ProxyClient {
    async fn process_file(&self, file: &UploadedFile, token: &str) -> Result<ProcessedFile> {
        let body = ProcessFileBody {
            file_data: STANDARD.encode(&file.bytes),
            mime_type: &file.mime_type,
        };
        let response = self
            .client
            .post(self.endpoint("process-file")?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }
}

#[async_trait]
impl AssistantBackend for ProxyClient {
    async fn summarize(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("summarize")?)
            .json(&SummarizeBody { text })
            .send()
            .await
            .map_err(transport)?;
        Self::decode::<SummaryReply>(response).await.map(|r| r.summary)
    }

    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("chat")?)
            .json(&ChatBody { history, message })
            .send()
            .await
            .map_err(transport)?;
        Self::decode::<ChatReply>(response).await.map(|r| r.text)
    }
}
