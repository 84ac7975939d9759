//! Adapter interfaces for external systems.
//!
//! Every provider the content manager talks to sits behind one of these
//! traits, so workflows can be exercised with in-process doubles.

pub mod cache;
pub mod categorizer;
pub mod extractor;
pub mod openai;
pub mod quiz;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ProviderError;

pub use cache::{CategoryCache, MemoryCategoryCache};
pub use categorizer::Categorizer;
pub use extractor::{ExtractedContent, HttpExtractor};
pub use openai::{OpenAIClient, OpenAIConfig};
pub use quiz::{QuizGenerator, QuizRequest};

/// Fetches a URL and reduces it to readable text
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_url(&self, url: &str) -> Result<ExtractedContent, ProviderError>;
}

/// Produces a fixed-length vector for a text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding model identifier
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Generative completion constrained to return a JSON object
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generation model identifier
    fn model_name(&self) -> &str;

    /// Returns the raw JSON text produced by the model
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Decode a JSON object from a model reply, tolerating markdown fences
pub(crate) fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, ProviderError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed JSON reply: {}", e)))
}

/// Cut `text` to at most `max_chars` characters
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        value: u32,
    }

    #[test]
    fn test_parse_plain_json() {
        let reply: Reply = parse_json_reply(r#"{"value": 3}"#).unwrap();
        assert_eq!(reply, Reply { value: 3 });
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply: Reply = parse_json_reply("```json\n{\"value\": 4}\n```").unwrap();
        assert_eq!(reply.value, 4);

        let reply: Reply = parse_json_reply("```\n{\"value\": 5}\n```\n").unwrap();
        assert_eq!(reply.value, 5);
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        let result: Result<Reply, _> = parse_json_reply("sure! here is your quiz");
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
