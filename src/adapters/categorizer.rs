//! Content categorization through a completion backend.
//!
//! Results are cached by a hash of title and content, so the same input
//! never reaches the backend twice. Concurrent callers with the same input
//! queue on a per-key gate and are answered from the cache once the first
//! call finishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use super::cache::{cache_key, CategoryCache};
use super::{parse_json_reply, truncate_chars, CompletionBackend};
use crate::core::RetryPolicy;
use crate::domain::CategoryResult;
use crate::error::ProviderError;

/// Characters of content sent to the model
const MAX_PROMPT_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You are a librarian who files learning material. \
Reply with a single JSON object and nothing else.";

/// Classifies content into a category with tags and a summary
pub struct Categorizer {
    backend: Arc<dyn CompletionBackend>,
    cache: Arc<dyn CategoryCache>,
    retry: RetryPolicy,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Membership in the per-key gate map; the entry is dropped with its last holder
struct InFlight<'a> {
    map: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    key: &'a str,
    gate: Arc<AsyncMutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(map: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>, key: &'a str) -> Self {
        let mut gates = map.lock().unwrap_or_else(|e| e.into_inner());
        let gate = gates.entry(key.to_string()).or_default().clone();
        Self { map, key, gate }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut gates = self.map.lock().unwrap_or_else(|e| e.into_inner());
        // map entry plus this handle
        if Arc::strong_count(&self.gate) <= 2 {
            gates.remove(self.key);
        }
    }
}

impl Categorizer {
    /// Three attempts, one second apart
    pub fn new(backend: Arc<dyn CompletionBackend>, cache: Arc<dyn CategoryCache>) -> Self {
        Self {
            backend,
            cache,
            retry: RetryPolicy::fixed(3, Duration::from_secs(1)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn categorize(
        &self,
        title: &str,
        content: &str,
    ) -> Result<CategoryResult, ProviderError> {
        if content.trim().is_empty() {
            return Err(ProviderError::Validation(
                "cannot categorize empty content".to_string(),
            ));
        }

        let key = cache_key(title, content);
        if let Some(hit) = self.cache.get(&key) {
            debug!(category = %hit.category, "Categorization cache hit");
            return Ok(hit);
        }

        let in_flight = InFlight::join(&self.in_flight, &key);
        let _turn = in_flight.gate.lock().await;
        if let Some(hit) = self.cache.get(&key) {
            debug!(category = %hit.category, "Categorized by a concurrent call");
            return Ok(hit);
        }

        let prompt = build_prompt(title, content);
        let (backend, prompt) = (&self.backend, prompt.as_str());
        let result = self
            .retry
            .run("categorize", || async move {
                let raw = backend.complete_json(SYSTEM_PROMPT, prompt).await?;
                parse_category(&raw)
            })
            .await?;

        debug!(
            category = %result.category,
            confidence = result.confidence,
            tags = result.tags.len(),
            "Categorized content"
        );

        self.cache.put(&key, result.clone());
        Ok(result)
    }
}

fn build_prompt(title: &str, content: &str) -> String {
    format!(
        "Categorize the following content.\n\n\
         Title: {title}\n\n\
         Content:\n{content}\n\n\
         Return JSON with these fields:\n\
         - \"category\": one broad subject area, for example Technology, Science, Business, History\n\
         - \"confidence\": a number between 0 and 1\n\
         - \"tags\": 3 to 6 short topical tags\n\
         - \"summary\": two or three sentences summarizing the key points",
        title = title,
        content = truncate_chars(content, MAX_PROMPT_CHARS),
    )
}

fn parse_category(raw: &str) -> Result<CategoryResult, ProviderError> {
    let result: CategoryResult = parse_json_reply(raw)?;
    let result = result.normalized();
    if result.category.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "categorization returned an empty category".to_string(),
        ));
    }
    Ok(result)
}
