//! OpenAI embedding and chat providers over the REST API.
//!
//! This module is only available when the `openai` feature is enabled. Any
//! OpenAI-compatible endpoint works by changing the base URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{ProviderFailure, ProviderResult, RagError, Result};
use crate::generation::GenerationProvider;

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default chat model used for answers.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// Connection settings shared by both providers.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    /// Embedding dimensions. Sent to the API when it differs from the model default.
    pub dimensions: usize,
    pub request_timeout: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Pooled HTTP client for the OpenAI API, implementing both
/// [`EmbeddingProvider`] and [`GenerationProvider`].
///
/// # Example
///
/// ```rust,ignore
/// use semdoc_rag::openai::{OpenAIClient, OpenAIConfig};
///
/// let client = Arc::new(OpenAIClient::new(OpenAIConfig::new("sk-..."))?);
/// let embedding = client.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAIClient {
    /// Create a client. The underlying connection pool is shared by clones.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the API key is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ProviderResult<R> {
        let url = format!("{}/{path}", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "openai", error = %e, "request failed");
                ProviderFailure::transient(format!("request to {path} failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = "openai", %status, "API error");
            return Err(ProviderFailure::from_status(
                status.as_u16(),
                format!("API returned {status}: {detail}"),
            ));
        }

        response.json::<R>().await.map_err(|e| {
            error!(provider = "openai", error = %e, "failed to parse response");
            ProviderFailure::rejected(format!("failed to parse {path} response: {e}"))
        })
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Provider implementations ───────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderFailure::rejected("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = "openai",
            batch_size = texts.len(),
            model = %self.config.embedding_model,
            "embedding batch"
        );

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
            dimensions: (self.config.dimensions != DEFAULT_DIMENSIONS)
                .then_some(self.config.dimensions),
        };
        let mut response: EmbeddingResponse = self.post("embeddings", &request).await?;

        // Results carry their input position in `index`.
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

#[async_trait]
impl GenerationProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        debug!(provider = "openai", model = %self.config.chat_model, prompt_len = prompt.len(), "generating");

        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: 0.0,
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderFailure::rejected("API returned no completion choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_config_error() {
        assert!(matches!(OpenAIClient::new(OpenAIConfig::new("")), Err(RagError::Config(_))));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = OpenAIConfig::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }
}
