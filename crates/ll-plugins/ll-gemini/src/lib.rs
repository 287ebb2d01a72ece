//! # ll-gemini
//!
//! Reqwest-backed `AiGateway` over the Gemini `generateContent` REST API.
//! This adapter owns transport details only: prompt assembly, request
//! serialisation, HTTP error mapping, and decoding of the reply text.

mod dto;

use std::time::Duration;

use async_trait::async_trait;
use ll_core::error::{AppError, Result};
use ll_core::models::{ChatTurn, ProcessedFile};
use ll_core::traits::AiGateway;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use dto::{
    ContentDto, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, GenerationConfigDto,
    PartDto,
};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const EXTRACTION_PROMPT: &str = "First, extract the full text content from this file. \
If it's audio, transcribe it. If it's a document, extract the text. \
Second, based on the extracted content, generate 5-7 relevant keywords or tags that describe the main themes. \
Return the result as a JSON object with two keys: 'content' for the extracted text and 'tags' for the array of keywords.";

const SUMMARY_PREFIX: &str =
    "Please provide a concise, easy-to-read summary of the following text:\n\n---\n\n";

/// Temperature used for text extraction; low so transcripts stay literal.
const EXTRACTION_TEMPERATURE: f32 = 0.2;

/// Where and how to reach the gateway.
pub struct GeminiOptions {
    /// Base URL ending in the API version, e.g. `.../v1beta/`.
    pub endpoint: Url,
    pub model: String,
    /// Temperature for summaries and chat.
    pub temperature: f32,
    pub timeout: Duration,
}

pub struct GeminiGateway {
    client: Client,
    generate_url: Url,
    api_key: SecretString,
    temperature: f32,
}

impl GeminiGateway {
    /// Build a gateway using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the model URL cannot be formed or the reqwest
    /// client cannot be constructed.
    pub fn new(api_key: SecretString, options: GeminiOptions) -> Result<Self> {
        let generate_url = options
            .endpoint
            .join(&format!("models/{}:generateContent", options.model))
            .map_err(|e| AppError::Validation(format!("invalid gemini endpoint: {e}")))?;
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            generate_url,
            api_key,
            temperature: options.temperature,
        })
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String> {
        let response = self
            .client
            .post(self.generate_url.clone())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::RemoteService(format!("gateway unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::RemoteService(format!("gateway body: {e}")))?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        let decoded: GenerateContentResponse = serde_json::from_slice(&body)
            .map_err(|e| AppError::RemoteService(format!("invalid gateway payload: {e}")))?;
        decoded
            .text()
            .ok_or_else(|| AppError::RemoteService("gateway returned no text".to_string()))
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> AppError {
    let detail = serde_json::from_slice::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_default();
    tracing::warn!(%status, detail = %detail, "gateway rejected request");
    AppError::RemoteService(format!("gateway returned {status}: {detail}"))
}

fn extraction_request(file_data: &str, mime_type: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![ContentDto {
            role: Some("user".to_string()),
            parts: vec![
                PartDto::inline(mime_type, file_data),
                PartDto::text(EXTRACTION_PROMPT),
            ],
        }],
        generation_config: Some(GenerationConfigDto {
            temperature: EXTRACTION_TEMPERATURE,
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(json!({
                "type": "OBJECT",
                "properties": {
                    "content": { "type": "STRING" },
                    "tags": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            })),
        }),
    }
}

fn summary_request(text: &str, temperature: f32) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![ContentDto {
            role: Some("user".to_string()),
            parts: vec![PartDto::text(format!("{SUMMARY_PREFIX}{text}"))],
        }],
        generation_config: Some(GenerationConfigDto {
            temperature,
            response_mime_type: None,
            response_schema: None,
        }),
    }
}

fn chat_request(history: &[ChatTurn], message: &str, temperature: f32) -> GenerateContentRequest {
    let mut contents: Vec<ContentDto> = history.iter().map(ContentDto::from).collect();
    contents.push(ContentDto {
        role: Some("user".to_string()),
        parts: vec![PartDto::text(message)],
    });
    GenerateContentRequest {
        contents,
        generation_config: Some(GenerationConfigDto {
            temperature,
            response_mime_type: None,
            response_schema: None,
        }),
    }
}

/// Decodes the `{content, tags}` object the extraction prompt asks for.
/// Tolerates a markdown code fence around the JSON.
fn parse_processed(text: &str) -> Result<ProcessedFile> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim())
        .map_err(|e| AppError::RemoteService(format!("gateway returned malformed extraction: {e}")))
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn process_file(&self, file_data: &str, mime_type: &str) -> Result<ProcessedFile> {
        let text = self.generate(&extraction_request(file_data, mime_type)).await?;
        let processed = parse_processed(&text)?;
        tracing::debug!(tags = processed.tags.len(), chars = processed.content.len(), "file processed");
        Ok(processed)
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        self.generate(&summary_request(text, self.temperature)).await
    }

    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        self.generate(&chat_request(history, message, self.temperature)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_request_carries_file_and_schema() {
        let body = serde_json::to_value(extraction_request("QUJD", "application/pdf")).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert!(parts[1]["text"].as_str().unwrap().starts_with("First, extract"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["tags"]["type"],
            "ARRAY"
        );
    }

    #[test]
    fn chat_request_appends_message_after_history() {
        let history = vec![
            ChatTurn::text("user", "hi"),
            ChatTurn::text("model", "hello, how can I help?"),
        ];
        let body = serde_json::to_value(chat_request(&history, "summarize AI", 0.7)).unwrap();
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "summarize AI");
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn summary_prompt_wraps_text() {
        let body = serde_json::to_value(summary_request("long text", 0.7)).unwrap();
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.starts_with("Please provide a concise"));
        assert!(prompt.ends_with("---\n\nlong text"));
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let decoded: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(decoded.text().as_deref(), Some("Hello world"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn parses_plain_and_fenced_extractions() {
        let plain = parse_processed(r#"{"content":"Extracted text","tags":["a","b"]}"#).unwrap();
        assert_eq!(plain.content, "Extracted text");
        assert_eq!(plain.tags, vec!["a", "b"]);

        let fenced = parse_processed("```json\n{\"content\":\"x\",\"tags\":[]}\n```").unwrap();
        assert_eq!(fenced.content, "x");

        assert!(matches!(
            parse_processed("not json"),
            Err(AppError::RemoteService(_))
        ));
    }

    #[test]
    fn status_errors_surface_gateway_message() {
        let err = map_status_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":{"code":400,"message":"API key not valid"}}"#,
        );
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn model_url_is_built_from_endpoint() {
        let gateway = GeminiGateway::new(
            SecretString::from("k".to_string()),
            GeminiOptions {
                endpoint: Url::parse(DEFAULT_ENDPOINT).unwrap(),
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.7,
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        assert_eq!(
            gateway.generate_url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
