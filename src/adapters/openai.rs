//! OpenAI-compatible client for embeddings and JSON-mode chat completions.
//!
//! Works against any endpoint that speaks the `/embeddings` and
//! `/chat/completions` wire format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{truncate_chars, CompletionBackend, EmbeddingProvider};
use crate::error::ProviderError;

/// Default API endpoint
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default embedding model
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default generation model
pub const DEFAULT_GEN_MODEL: &str = "gpt-4o-mini";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default cap on characters sent for one embedding. Keeps a page well under
/// the 8191-token input limit of the OpenAI embedding models.
pub const DEFAULT_MAX_EMBED_CHARS: usize = 24_000;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional for local endpoints
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Longer inputs are truncated before embedding
    #[serde(default = "default_max_embed_chars")]
    pub max_embed_chars: usize,

    #[serde(default = "default_gen_model")]
    pub gen_model: String,

    /// Generation temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    DEFAULT_OPENAI_URL.to_string()
}
fn default_embed_model() -> String {
    DEFAULT_EMBED_MODEL.to_string()
}
fn default_max_embed_chars() -> usize {
    DEFAULT_MAX_EMBED_CHARS
}
fn default_gen_model() -> String {
    DEFAULT_GEN_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            embed_model: default_embed_model(),
            max_embed_chars: default_max_embed_chars(),
            gen_model: default_gen_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// HTTP client for an OpenAI-compatible API
pub struct OpenAIClient {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIClient {
    pub fn new(config: OpenAIConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Api(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            "Initializing OpenAI client"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    async fn send<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let response = self.build_request(endpoint).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<OpenAIErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            };
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.config.embed_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let input = truncate_chars(text, self.config.max_embed_chars);
        if input.len() < text.len() {
            debug!(
                max_chars = self.config.max_embed_chars,
                dropped_bytes = text.len() - input.len(),
                "Truncating embedding input"
            );
        }
        debug!(model = %self.config.embed_model, chars = input.len(), "Embedding text");

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: vec![input.to_string()],
            encoding_format: Some("float".to_string()),
        };

        let response: EmbeddingResponse = self.send("/embeddings", &request).await?;

        let embedding = response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "embedding response contained no vector".to_string(),
            ));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl CompletionBackend for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.config.gen_model
    }

    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        debug!(
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            "Requesting JSON completion"
        );

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response: ChatCompletionResponse = self.send("/chat/completions", &request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "completion response was empty".to_string(),
            ));
        }
        Ok(content)
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: Some(0.2),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"], json!({"type": "json_object"}));
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_config_defaults_from_empty_yaml() {
        let config: OpenAIConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, OpenAIConfig::default());
        assert_eq!(config.embed_model, DEFAULT_EMBED_MODEL);
        assert_eq!(config.max_embed_chars, DEFAULT_MAX_EMBED_CHARS);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = OpenAIConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("sk-secret"));
    }
}
