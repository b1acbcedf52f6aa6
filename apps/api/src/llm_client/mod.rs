/// LLM Client: the single point of entry for calls to the extraction service.
///
/// ARCHITECTURAL RULE: No other module talks to the service over HTTP.
/// Everything goes through `ExtractionService`, which `MoonshotClient`
/// implements against the Moonshot-compatible files + chat-completions API.
///
/// This layer does not retry. Retry and polling schedules belong to the
/// normalizer, which sees the whole upload → poll → extract sequence.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;
pub mod repair;

pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const DEFAULT_MODEL: &str = "moonshot-v1-128k";
const FILE_PURPOSE: &str = "file-extract";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by service: {body}")]
    RateLimited { body: String },

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("service returned empty content")]
    EmptyContent,
}

impl ServiceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// One chat-completions request. Always asks for a JSON object response.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl CompletionRequest {
    pub fn json_object(model: &str, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages,
            temperature: 0.1,
            top_p: 0.95,
            max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

/// The operations the normalizer needs from the extraction service.
///
/// Carried in the normalizer as `Arc<dyn ExtractionService>` so tests can
/// script the service.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Uploads a document, returning the service's file handle.
    async fn upload_file(&self, bytes: Bytes, filename: &str) -> Result<String, ServiceError>;

    /// Current processing status of an uploaded file.
    async fn file_status(&self, file_id: &str) -> Result<String, ServiceError>;

    /// Text the service extracted from an uploaded file.
    async fn file_content(&self, file_id: &str) -> Result<String, ServiceError>;

    /// Runs a chat completion, returning the raw text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ServiceError> {
        if let Some(usage) = &self.usage {
            debug!(
                "Completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ServiceError::EmptyContent)
    }
}

/// HTTP client for a Moonshot-compatible extraction service.
#[derive(Clone)]
pub struct MoonshotClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl MoonshotClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Maps a non-success response to the matching error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ServiceError::RateLimited { body });
    }
    Err(ServiceError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ExtractionService for MoonshotClient {
    async fn upload_file(&self, bytes: Bytes, filename: &str) -> Result<String, ServiceError> {
        let part = multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let form = multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part("file", part);

        let response = self
            .client
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadedFile = check_status(response).await?.json().await?;
        Ok(uploaded.id)
    }

    async fn file_status(&self, file_id: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/files/{file_id}")))
            .bearer_auth(&self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;

        let info: FileInfo = check_status(response).await?.json().await?;
        Ok(info.status)
    }

    async fn file_content(&self, file_id: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/files/{file_id}/content")))
            .bearer_auth(&self.api_key)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        let content = check_status(response).await?.text().await?;
        if content.trim().is_empty() {
            return Err(ServiceError::EmptyContent);
        }
        Ok(content)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let chat: ChatResponse = check_status(response).await?.json().await?;
        chat.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_request_wire_format() {
        let request = CompletionRequest::json_object(
            DEFAULT_MODEL,
            vec![ChatMessage::system("rules"), ChatMessage::user("go")],
            8000,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "moonshot-v1-128k");
        assert_eq!(value["response_format"], json!({"type": "json_object"}));
        assert_eq!(value["messages"][0], json!({"role": "system", "content": "rules"}));
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["max_tokens"], 8000);
    }

    #[test]
    fn test_chat_response_first_choice_text() {
        let chat: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"a\": 1}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();
        assert_eq!(chat.into_text().unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_chat_response_without_content_is_empty() {
        let chat: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  "}}]
        }))
        .unwrap();
        assert!(matches!(chat.into_text(), Err(ServiceError::EmptyContent)));

        let chat: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(chat.into_text(), Err(ServiceError::EmptyContent)));
    }

    #[test]
    fn test_file_info_tolerates_missing_status() {
        let info: FileInfo = serde_json::from_value(json!({"id": "f1"})).unwrap();
        assert_eq!(info.status, "");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = MoonshotClient::new("k".to_string(), "http://localhost:9000/v1/").unwrap();
        assert_eq!(client.url("/files"), "http://localhost:9000/v1/files");
    }
}
