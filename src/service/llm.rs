//! Generative model client
//!
//! Talks to the Gemini `generateContent` endpoint with optional Google Search
//! grounding and returns the plain text of the first candidate.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::GeminiConfig;
use crate::service::credentials::CredentialProvider;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No credential selected; the wording keeps "key" and "not found" so the
    /// widget routes the visitor to key selection
    #[error("API key not found")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

/// One completion request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// Allow the model to ground its answer with web search
    pub web_search: bool,
}

/// Seam for the text-generation backend
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

// Wire models - only the fields we need
#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

/// Gemini REST client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl GeminiClient {
    /// Create a new client; the API key is looked up per request so a key
    /// selected after startup is picked up
    pub fn new(config: &GeminiConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            credentials,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let api_key = self
            .credentials
            .api_key()
            .await
            .ok_or(LlmError::MissingApiKey)?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
            tools: if request.web_search {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
        };

        let url = self.endpoint(&request.model);

        tracing::debug!(
            model = %request.model,
            web_search = request.web_search,
            prompt_length = request.prompt.len(),
            "Sending generateContent request"
        );

        // Key goes in a header; a key in the query string would leak into
        // reqwest error messages
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            LlmError::ParseError(format!("Failed to deserialize generateContent response: {}", e))
        })?;

        parsed.text().ok_or(LlmError::EmptyResponse)
    }
}
