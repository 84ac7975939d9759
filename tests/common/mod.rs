//! Shared fakes for integration tests.
//!
//! Providers are scripted in memory so workflows can be exercised without
//! a network. Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cognitive_canvas::adapters::{
    CompletionBackend, EmbeddingProvider, ExtractedContent, Extractor, MemoryCategoryCache,
};
use cognitive_canvas::library::RawMetadata;
use cognitive_canvas::{ContentManager, ContentType, ProviderError, Providers, RetryPolicy, VectorStore};

/// Vocabulary the fake embedder projects text onto
const AXES: [&str; 3] = ["rust", "ocean", "music"];

/// Embeds text as keyword counts over [`AXES`], plus a small bias so no
/// vector is all zeros
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        Ok(AXES
            .iter()
            .map(|axis| lower.matches(axis).count() as f32 + 0.01)
            .collect())
    }
}

/// Serves canned pages by URL. A URL registered as flaky times out a set
/// number of times before it succeeds.
pub struct FakeExtractor {
    pages: HashMap<String, ExtractedContent>,
    failures_left: Mutex<HashMap<String, usize>>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failures_left: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page(mut self, url: &str, title: &str, content: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            ExtractedContent {
                title: title.to_string(),
                content: content.to_string(),
                content_type: ContentType::Url,
                url: Some(url.to_string()),
                domain: Some("example.com".to_string()),
                metadata: RawMetadata {
                    author: Some("Jane Roe".to_string()),
                    ..Default::default()
                },
            },
        );
        self
    }

    pub fn with_timeouts(self, url: &str, times: usize) -> Self {
        self.failures_left
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
        self
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract_url(&self, url: &str) -> Result<ExtractedContent, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(url) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ProviderError::Timeout(format!("{} did not answer", url)));
                }
            }
        }

        self.pages.get(url).cloned().ok_or(ProviderError::Http {
            status: 404,
            message: "Not Found".to_string(),
        })
    }
}

/// Answers categorization and quiz prompts with fixed JSON, counting each
pub struct ScriptedCompletion {
    category_reply: String,
    quiz_reply: String,
    delay: Duration,
    pub category_calls: AtomicUsize,
    pub quiz_calls: AtomicUsize,
    pub quiz_prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(category_reply: &str, quiz_reply: &str) -> Arc<Self> {
        Arc::new(Self {
            category_reply: category_reply.to_string(),
            quiz_reply: quiz_reply.to_string(),
            delay: Duration::ZERO,
            category_calls: AtomicUsize::new(0),
            quiz_calls: AtomicUsize::new(0),
            quiz_prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn standard() -> Arc<Self> {
        Self::new(CATEGORY_REPLY, MCQ_REPLY)
    }

    /// Standard replies, each held back by `delay`
    pub fn slow(delay: Duration) -> Arc<Self> {
        let mut completion = Self::new(CATEGORY_REPLY, MCQ_REPLY);
        if let Some(inner) = Arc::get_mut(&mut completion) {
            inner.delay = delay;
        }
        completion
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if system.contains("quiz") {
            self.quiz_calls.fetch_add(1, Ordering::SeqCst);
            self.quiz_prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.quiz_reply.clone())
        } else {
            self.category_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.category_reply.clone())
        }
    }
}

pub const CATEGORY_REPLY: &str = r#"{
    "category": "Programming",
    "confidence": 0.9,
    "tags": ["rust", "systems"],
    "summary": "An article about Rust ownership."
}"#;

pub const MCQ_REPLY: &str = r#"{
    "title": "Ownership Quiz",
    "questions": [
        {"number": 1, "topic": "Ownership", "question": "Who frees a value?",
         "explanation": "The owner drops it.", "choice": ["Owner", "Borrower", "GC", "Nobody"]}
    ]
}"#;

pub struct Fakes {
    pub extractor: Arc<FakeExtractor>,
    pub embedder: Arc<KeywordEmbedder>,
    pub completion: Arc<ScriptedCompletion>,
}

impl Fakes {
    pub fn new(extractor: FakeExtractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
            embedder: KeywordEmbedder::new(),
            completion: ScriptedCompletion::standard(),
        }
    }

    pub fn with_completion(mut self, completion: Arc<ScriptedCompletion>) -> Self {
        self.completion = completion;
        self
    }

    /// Manager over an in-memory store with short retry delays
    pub fn manager(&self) -> ContentManager {
        let store = VectorStore::open_in_memory().unwrap();
        self.manager_with_store(store)
    }

    pub fn manager_with_store(&self, store: VectorStore) -> ContentManager {
        let providers = Providers {
            extractor: self.extractor.clone(),
            embedder: self.embedder.clone(),
            completion: self.completion.clone(),
            cache: Arc::new(MemoryCategoryCache::new()),
        };
        ContentManager::new(store, providers)
            .with_retry(RetryPolicy::fixed(3, Duration::from_millis(10)))
            .with_provider_retry(RetryPolicy::none())
    }
}
