//! Content manager: end-to-end ingestion, retrieval and quiz workflows.
//!
//! Ingestion runs extraction, embedding, categorization, record assembly
//! and storage as one unit. The unit is retried as a whole on transient
//! provider failures; everything else fails on the first attempt. Callers
//! only ever see [`ContentError`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::extractor::{self, ExtractedContent, CODE_TITLE};
use crate::adapters::{
    truncate_chars, CategoryCache, Categorizer, CompletionBackend, EmbeddingProvider, Extractor,
    HttpExtractor, MemoryCategoryCache, OpenAIClient, QuizGenerator, QuizRequest,
};
use crate::config::ResolvedConfig;
use crate::domain::{Difficulty, Quiz, QuizType};
use crate::error::{ContentError, ContentResult, ProviderError, StoreError, ValidationError};
use crate::library::{
    Classification, ContentId, ContentRecord, ContentSource, MetadataFilter, StoreStatistics,
    StoredEntry, VectorStore,
};

use super::retry::{RetryPolicy, Retryable};

/// Title given to text ingested without one
pub const DEFAULT_TEXT_TITLE: &str = "Text Content";

/// Characters kept as summary when categorization is skipped
const EXCERPT_CHARS: usize = 200;

/// Why one ingestion attempt failed
#[derive(Debug, Error)]
enum IngestFailure {
    #[error("Content extraction failed: {0}")]
    Extraction(ProviderError),

    #[error("No content extracted")]
    NoContent,

    #[error("Embedding failed: {0}")]
    Embedding(ProviderError),

    #[error("Categorization failed: {0}")]
    Categorization(ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Retryable for IngestFailure {
    fn is_transient(&self) -> bool {
        match self {
            IngestFailure::Extraction(e)
            | IngestFailure::Embedding(e)
            | IngestFailure::Categorization(e) => e.is_transient(),
            IngestFailure::NoContent | IngestFailure::Store(_) => false,
        }
    }
}

/// Caller-supplied classification overrides
#[derive(Debug, Clone, Default)]
struct Labels {
    category: Option<String>,
    tags: Option<Vec<String>>,
}

impl Labels {
    fn new(custom_category: Option<&str>, custom_tags: Option<&[String]>) -> Self {
        Self {
            category: custom_category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            tags: custom_tags.map(|tags| {
                tags.iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }),
        }
    }
}

/// External collaborators of the manager
pub struct Providers {
    pub extractor: Arc<dyn Extractor>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completion: Arc<dyn CompletionBackend>,
    pub cache: Arc<dyn CategoryCache>,
}

/// Outcome of a bulk URL ingestion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkResult {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub success: Vec<BulkSuccess>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkSuccess {
    pub url: String,
    pub content_id: ContentId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub url: String,
    pub error: String,
}

/// A similarity search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: ContentRecord,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Orchestrates every content workflow
pub struct ContentManager {
    store: VectorStore,
    extractor: Arc<dyn Extractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    categorizer: Categorizer,
    quiz: QuizGenerator,
    retry: RetryPolicy,
    bulk_concurrency: usize,
}

impl ContentManager {
    pub fn new(store: VectorStore, providers: Providers) -> Self {
        Self {
            store,
            extractor: providers.extractor,
            embedder: providers.embedder,
            categorizer: Categorizer::new(providers.completion.clone(), providers.cache),
            quiz: QuizGenerator::new(providers.completion),
            retry: RetryPolicy::default(),
            bulk_concurrency: 4,
        }
    }

    /// Wire up the store and HTTP providers described by `config`
    pub fn from_config(config: &ResolvedConfig) -> anyhow::Result<Self> {
        let store = VectorStore::open(&config.store_path).with_context(|| {
            format!("Failed to open store: {}", config.store_path.display())
        })?;

        let client = Arc::new(
            OpenAIClient::new(config.provider.clone()).context("Failed to create provider client")?,
        );
        let extractor = Arc::new(
            HttpExtractor::new(Duration::from_secs(config.ingest.extract_timeout_seconds))
                .context("Failed to create extractor")?,
        );

        let providers = Providers {
            extractor,
            embedder: client.clone(),
            completion: client,
            cache: Arc::new(MemoryCategoryCache::new()),
        };

        Ok(Self::new(store, providers)
            .with_retry(config.ingest.retry.clone())
            .with_provider_retry(config.ingest.provider_retry.clone())
            .with_bulk_concurrency(config.ingest.bulk_concurrency))
    }

    /// Whole-workflow retry for ingestion
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retry used inside the categorization and quiz providers
    pub fn with_provider_retry(mut self, retry: RetryPolicy) -> Self {
        self.categorizer = self.categorizer.with_retry(retry.clone());
        self.quiz = self.quiz.with_retry(retry);
        self
    }

    pub fn with_bulk_concurrency(mut self, n: usize) -> Self {
        self.bulk_concurrency = n.max(1);
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Fetch, classify, embed and store a web page
    #[instrument(skip(self, custom_tags))]
    pub async fn store_from_url(
        &self,
        url: &str,
        custom_category: Option<&str>,
        custom_tags: Option<&[String]>,
    ) -> ContentResult<ContentRecord> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingField {
                field: "source_url",
                content_type: "url".to_string(),
            }
            .into());
        }
        info!("Starting URL ingestion");

        let labels = Labels::new(custom_category, custom_tags);
        let labels = &labels;
        let result = self
            .retry
            .run("store_from_url", || async move {
                let extracted = self
                    .extractor
                    .extract_url(url)
                    .await
                    .map_err(IngestFailure::Extraction)?;
                if extracted.content.trim().is_empty() {
                    return Err(IngestFailure::NoContent);
                }
                self.ingest(ContentSource::Url(url.to_string()), extracted, labels)
                    .await
            })
            .await;

        self.finish_ingest(result)
    }

    /// Clean, classify, embed and store raw text
    #[instrument(skip(self, text, custom_tags), fields(text_len = text.len()))]
    pub async fn store_from_text(
        &self,
        text: &str,
        title: Option<&str>,
        custom_category: Option<&str>,
        custom_tags: Option<&[String]>,
    ) -> ContentResult<ContentRecord> {
        let mut extracted = extractor::extract_text(text);
        extracted.title = pick_title(title, DEFAULT_TEXT_TITLE);
        self.store_local(ContentSource::Text, extracted, custom_category, custom_tags)
            .await
    }

    /// Store a code snippet with indentation preserved
    #[instrument(skip(self, code, custom_tags), fields(code_len = code.len()))]
    pub async fn store_from_code(
        &self,
        code: &str,
        title: Option<&str>,
        custom_category: Option<&str>,
        custom_tags: Option<&[String]>,
    ) -> ContentResult<ContentRecord> {
        let mut extracted = extractor::extract_code(code);
        extracted.title = pick_title(title, CODE_TITLE);
        self.store_local(ContentSource::Code, extracted, custom_category, custom_tags)
            .await
    }

    /// Ingest several URLs. One URL failing never stops the others, and
    /// results keep input order.
    #[instrument(skip(self, urls, custom_tags), fields(total = urls.len()))]
    pub async fn store_bulk_urls(
        &self,
        urls: &[String],
        custom_category: Option<&str>,
        custom_tags: Option<&[String]>,
    ) -> BulkResult {
        info!(concurrency = self.bulk_concurrency, "Starting bulk ingestion");

        let outcomes: Vec<(&String, ContentResult<ContentRecord>)> = stream::iter(urls)
            .map(|url| async move {
                let outcome = self.store_from_url(url, custom_category, custom_tags).await;
                (url, outcome)
            })
            .buffered(self.bulk_concurrency)
            .collect()
            .await;

        let mut result = BulkResult {
            total: urls.len(),
            ..Default::default()
        };
        for (url, outcome) in outcomes {
            match outcome {
                Ok(record) => result.success.push(BulkSuccess {
                    url: url.clone(),
                    content_id: record.id,
                }),
                Err(e) => result.failed.push(BulkFailure {
                    url: url.clone(),
                    error: e.to_string(),
                }),
            }
        }
        result.success_count = result.success.len();
        result.failed_count = result.failed.len();

        info!(
            succeeded = result.success_count,
            failed = result.failed_count,
            "Bulk ingestion complete"
        );
        result
    }

    async fn store_local(
        &self,
        source: ContentSource,
        extracted: ExtractedContent,
        custom_category: Option<&str>,
        custom_tags: Option<&[String]>,
    ) -> ContentResult<ContentRecord> {
        if extracted.content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        info!(content_type = %source.content_type(), "Starting local ingestion");

        let labels = Labels::new(custom_category, custom_tags);
        let (labels, source, extracted) = (&labels, &source, &extracted);
        let result = self
            .retry
            .run("store_local", || async move {
                self.ingest(source.clone(), extracted.clone(), labels).await
            })
            .await;

        self.finish_ingest(result)
    }

    /// Steps shared by every ingestion path, after extraction
    async fn ingest(
        &self,
        source: ContentSource,
        extracted: ExtractedContent,
        labels: &Labels,
    ) -> Result<ContentRecord, IngestFailure> {
        debug!("Generating embedding");
        let embedding = self
            .embedder
            .embed(&extracted.content)
            .await
            .map_err(IngestFailure::Embedding)?;

        let classification = self
            .classify(&extracted.title, &extracted.content, labels)
            .await?;

        let record = ContentRecord::new(
            source,
            extracted.content,
            extracted.title,
            classification,
            embedding,
            extracted.metadata,
        );

        debug!(id = %record.id, category = %record.category, "Storing record");
        self.store.store(&record).await?;
        Ok(record)
    }

    async fn classify(
        &self,
        title: &str,
        content: &str,
        labels: &Labels,
    ) -> Result<Classification, IngestFailure> {
        if let Some(category) = &labels.category {
            debug!(%category, "Using caller category, skipping categorization");
            return Ok(Classification {
                category: category.clone(),
                tags: labels.tags.clone().unwrap_or_default(),
                summary: excerpt(content),
            });
        }

        let result = self
            .categorizer
            .categorize(title, content)
            .await
            .map_err(IngestFailure::Categorization)?;

        let summary = if result.summary.is_empty() {
            excerpt(content)
        } else {
            result.summary
        };

        Ok(Classification {
            category: result.category,
            tags: labels.tags.clone().unwrap_or(result.tags),
            summary,
        })
    }

    fn finish_ingest(
        &self,
        result: Result<ContentRecord, IngestFailure>,
    ) -> ContentResult<ContentRecord> {
        match result {
            Ok(record) => {
                info!(id = %record.id, category = %record.category, "Content stored");
                Ok(record)
            }
            Err(e) => {
                error!(error = %e, "Content ingestion failed");
                Err(ContentError::ContentStorage(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// Records in `category`, most recent first
    #[instrument(skip(self))]
    pub async fn retrieve_by_category(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> ContentResult<Vec<ContentRecord>> {
        if category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory.into());
        }
        if limit == Some(0) {
            return Err(ValidationError::NonPositiveLimit.into());
        }

        let entries = self
            .store
            .get_by_category(category, limit)
            .await
            .map_err(retrieval_error)?;
        let records = into_records(entries)?;

        debug!(count = records.len(), "Retrieved by category");
        Ok(records)
    }

    /// Records written within `[start, end]`, oldest first
    #[instrument(skip(self))]
    pub async fn retrieve_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> ContentResult<Vec<ContentRecord>> {
        if start > end {
            return Err(ValidationError::InvertedDateRange.into());
        }
        if limit == Some(0) {
            return Err(ValidationError::NonPositiveLimit.into());
        }

        let entries = self
            .store
            .query_by_date_range(start, end, limit, 0, category)
            .await
            .map_err(retrieval_error)?;
        let records = into_records(entries)?;

        debug!(count = records.len(), "Retrieved by date range");
        Ok(records)
    }

    /// Records most similar to `query_text`, best first
    #[instrument(skip(self, query_text))]
    pub async fn similarity_search(
        &self,
        query_text: &str,
        top_k: usize,
        category_filter: Option<&str>,
    ) -> ContentResult<Vec<SearchHit>> {
        if query_text.trim().is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        if top_k == 0 {
            return Err(ValidationError::NonPositiveLimit.into());
        }

        let query = self.embedder.embed(query_text).await.map_err(|e| {
            error!(error = %e, "Query embedding failed");
            ContentError::ContentRetrieval(format!("Similarity search failed: {}", e))
        })?;

        let filter = category_filter.map(MetadataFilter::category);
        let scored = self
            .store
            .similarity_search(&query, top_k, filter.as_ref())
            .await
            .map_err(retrieval_error)?;

        scored
            .into_iter()
            .map(|s| {
                let score = s.score;
                s.entry
                    .into_record()
                    .map(|record| SearchHit { record, score })
                    .map_err(retrieval_error)
            })
            .collect()
    }

    pub async fn list_categories(&self) -> ContentResult<BTreeSet<String>> {
        self.store.get_all_categories().await.map_err(retrieval_error)
    }

    pub async fn list_tags(&self) -> ContentResult<BTreeSet<String>> {
        self.store.get_all_tags().await.map_err(retrieval_error)
    }

    pub async fn get_statistics(&self) -> ContentResult<StoreStatistics> {
        self.store.statistics().await.map_err(retrieval_error)
    }

    // ------------------------------------------------------------------
    // Quizzes
    // ------------------------------------------------------------------

    /// Quiz over the summaries of every record in `category`
    #[instrument(skip(self))]
    pub async fn generate_quiz_from_category(
        &self,
        category: &str,
        num_questions: u32,
        difficulty: Difficulty,
        quiz_type: QuizType,
    ) -> ContentResult<Quiz> {
        if category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory.into());
        }
        check_question_count(num_questions)?;
        info!("Generating quiz from category");

        let entries = self
            .store
            .get_by_category(category, None)
            .await
            .map_err(|e| ContentError::QuizGeneration(e.to_string()))?;
        if entries.is_empty() {
            return Err(ContentError::QuizGeneration(format!(
                "No content found for category: {}",
                category
            )));
        }

        let summaries = summaries_of(&entries);
        self.generate_quiz(summaries, category.to_string(), num_questions, difficulty, quiz_type)
            .await
    }

    /// Quiz over the summaries of specific records
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    pub async fn generate_quiz_from_content_ids(
        &self,
        ids: &[ContentId],
        num_questions: u32,
        difficulty: Difficulty,
        quiz_type: QuizType,
    ) -> ContentResult<Quiz> {
        check_question_count(num_questions)?;
        if ids.is_empty() {
            return Err(ContentError::QuizGeneration(
                "No content IDs provided".to_string(),
            ));
        }

        let entries = self
            .store
            .get_by_ids(ids)
            .await
            .map_err(|e| ContentError::QuizGeneration(e.to_string()))?;
        if entries.len() < ids.len() {
            warn!(
                requested = ids.len(),
                found = entries.len(),
                "Some content ids were not found"
            );
        }

        let categories: BTreeSet<&str> = entries
            .iter()
            .map(|e| e.metadata.category.as_str())
            .collect();
        let category = categories.into_iter().collect::<Vec<_>>().join(", ");

        let summaries = summaries_of(&entries);
        self.generate_quiz(summaries, category, num_questions, difficulty, quiz_type)
            .await
    }

    /// Quiz over caller-provided summaries; the store is not consulted
    #[instrument(skip(self, summaries), fields(summaries = summaries.len()))]
    pub async fn generate_quiz_from_summaries(
        &self,
        summaries: Vec<String>,
        category: &str,
        num_questions: u32,
        difficulty: Difficulty,
        quiz_type: QuizType,
    ) -> ContentResult<Quiz> {
        let request = QuizRequest {
            summaries,
            category: category.to_string(),
            num_questions,
            difficulty,
            quiz_type,
        };
        request.validate()?;
        self.run_quiz(&request).await
    }

    async fn generate_quiz(
        &self,
        summaries: Vec<String>,
        category: String,
        num_questions: u32,
        difficulty: Difficulty,
        quiz_type: QuizType,
    ) -> ContentResult<Quiz> {
        if summaries.is_empty() {
            return Err(ContentError::QuizGeneration("No content found".to_string()));
        }

        let request = QuizRequest {
            summaries,
            category,
            num_questions,
            difficulty,
            quiz_type,
        };
        self.run_quiz(&request).await
    }

    async fn run_quiz(&self, request: &QuizRequest) -> ContentResult<Quiz> {
        match self.quiz.generate(request).await {
            Ok(quiz) => Ok(quiz),
            Err(e) => {
                error!(error = %e, "Quiz generation failed");
                Err(ContentError::QuizGeneration(e.to_string()))
            }
        }
    }
}

fn pick_title(title: Option<&str>, default: &str) -> String {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn excerpt(content: &str) -> String {
    let cut = truncate_chars(content, EXCERPT_CHARS);
    if cut.len() < content.len() {
        format!("{}...", cut.trim_end())
    } else {
        cut.to_string()
    }
}

fn check_question_count(num_questions: u32) -> Result<(), ValidationError> {
    if num_questions == 0 {
        return Err(ValidationError::NonPositiveQuestionCount);
    }
    Ok(())
}

fn summaries_of(entries: &[StoredEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.metadata.summary.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn retrieval_error(e: StoreError) -> ContentError {
    error!(error = %e, "Content retrieval failed");
    ContentError::ContentRetrieval(e.to_string())
}

fn into_records(entries: Vec<StoredEntry>) -> ContentResult<Vec<ContentRecord>> {
    entries
        .into_iter()
        .map(|e| e.into_record().map_err(retrieval_error))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_ignore_blank_category() {
        let labels = Labels::new(Some("   "), None);
        assert!(labels.category.is_none());

        let tags = vec![" rust ".to_string(), "".to_string()];
        let labels = Labels::new(Some(" Programming "), Some(&tags));
        assert_eq!(labels.category.as_deref(), Some("Programming"));
        assert_eq!(labels.tags, Some(vec!["rust".to_string()]));
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short"), "short");

        let long = "word ".repeat(100);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_pick_title() {
        assert_eq!(pick_title(None, DEFAULT_TEXT_TITLE), "Text Content");
        assert_eq!(pick_title(Some("  "), DEFAULT_TEXT_TITLE), "Text Content");
        assert_eq!(pick_title(Some("Notes"), DEFAULT_TEXT_TITLE), "Notes");
    }

    #[test]
    fn test_ingest_failure_transience() {
        assert!(IngestFailure::Extraction(ProviderError::Timeout("t".into())).is_transient());
        assert!(IngestFailure::Embedding(ProviderError::Connection("c".into())).is_transient());
        assert!(!IngestFailure::NoContent.is_transient());
        assert!(!IngestFailure::Categorization(ProviderError::InvalidResponse("x".into()))
            .is_transient());
        assert!(!IngestFailure::Store(StoreError::LockPoisoned).is_transient());
    }

    #[test]
    fn test_ingest_failure_messages() {
        assert_eq!(IngestFailure::NoContent.to_string(), "No content extracted");
        let e = IngestFailure::Extraction(ProviderError::Timeout("slow".into()));
        assert!(e.to_string().starts_with("Content extraction failed: Request timed out"));
    }
}
