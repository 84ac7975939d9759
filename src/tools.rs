//! Tool entry points.
//!
//! Typed request and response shapes for the three externally callable
//! tools. Every request is validated before any I/O happens; the work
//! itself is delegated to [`ContentManager`].

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::ContentManager;
use crate::domain::{Difficulty, Quiz, QuizType};
use crate::error::{ContentError, ContentResult, ValidationError};
use crate::library::{ContentRecord, ContentType};

const DEFAULT_K: usize = 5;
const DEFAULT_NUM_QUESTIONS: u32 = 5;

fn default_k() -> usize {
    DEFAULT_K
}
fn default_num_questions() -> u32 {
    DEFAULT_NUM_QUESTIONS
}
fn default_difficulty() -> String {
    Difficulty::Mixed.as_str().to_string()
}

// ============================================================================
// store_content
// ============================================================================

/// Input of `store_content`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreContentRequest {
    pub content_type: String,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Body for `text` and `code`
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub custom_category: Option<String>,
    #[serde(default)]
    pub custom_tags: Option<Vec<String>>,
}

/// Validated ingestion target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTarget<'a> {
    Url(&'a str),
    Text(&'a str),
    Code(&'a str),
}

impl StoreContentRequest {
    pub fn validate(&self) -> Result<StoreTarget<'_>, ValidationError> {
        let content_type: ContentType = self.content_type.parse()?;

        match content_type {
            ContentType::Url => non_blank(self.source_url.as_deref())
                .map(StoreTarget::Url)
                .ok_or(ValidationError::MissingField {
                    field: "source_url",
                    content_type: content_type.to_string(),
                }),
            ContentType::Text | ContentType::Code => {
                let body = non_blank(self.text.as_deref()).ok_or(ValidationError::MissingField {
                    field: "text",
                    content_type: content_type.to_string(),
                })?;
                Ok(if content_type == ContentType::Text {
                    StoreTarget::Text(body)
                } else {
                    StoreTarget::Code(body)
                })
            }
        }
    }
}

/// Output of `store_content`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreContentResponse {
    pub content_id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub content_type: ContentType,
    pub source_url: Option<String>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    pub author: String,
    pub date_published: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub citation: Option<String>,
}

impl From<ContentRecord> for StoreContentResponse {
    fn from(record: ContentRecord) -> Self {
        Self {
            content_id: record.id.to_string(),
            title: record.title,
            summary: record.summary,
            category: record.category,
            tags: record.tags,
            content_type: record.content_type,
            source_url: record.source_url,
            metadata: ResponseMetadata {
                author: record.metadata.author,
                date_published: record.metadata.date_published.to_rfc3339(),
                abstract_text: record.metadata.abstract_text,
                keywords: record.metadata.keywords,
                citation: record.metadata.citation,
            },
        }
    }
}

/// Ingest a URL, text or code snippet
#[instrument(skip(manager, request), fields(content_type = %request.content_type))]
pub async fn store_content(
    manager: &ContentManager,
    request: StoreContentRequest,
) -> ContentResult<StoreContentResponse> {
    let target = request.validate()?;
    let category = request.custom_category.as_deref();
    let tags = request.custom_tags.as_deref();
    let title = request.title.as_deref();

    let record = match target {
        StoreTarget::Url(url) => manager.store_from_url(url, category, tags).await?,
        StoreTarget::Text(text) => manager.store_from_text(text, title, category, tags).await?,
        StoreTarget::Code(code) => manager.store_from_code(code, title, category, tags).await?,
    };

    info!(content_id = %record.id, "store_content complete");
    Ok(record.into())
}

// ============================================================================
// query_content
// ============================================================================

/// Input of `query_content`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryContentRequest {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for QueryContentRequest {
    fn default() -> Self {
        Self {
            query_text: None,
            start_date: None,
            end_date: None,
            category: None,
            k: DEFAULT_K,
        }
    }
}

/// Validated query
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySelector<'a> {
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Category(&'a str),
}

impl QueryContentRequest {
    /// Exactly one of a full date range or a category must be present
    pub fn validate(&self) -> Result<QuerySelector<'_>, ValidationError> {
        if self.k == 0 {
            return Err(ValidationError::NonPositiveLimit);
        }

        let start = non_blank(self.start_date.as_deref());
        let end = non_blank(self.end_date.as_deref());
        let category = non_blank(self.category.as_deref());

        match (start, end, category) {
            (Some(_), Some(_), Some(_)) => Err(ValidationError::AmbiguousQuerySelector),
            (Some(start), Some(end), None) => {
                let start = parse_date_bound(start, false)?;
                let end = parse_date_bound(end, true)?;
                if start > end {
                    return Err(ValidationError::InvertedDateRange);
                }
                Ok(QuerySelector::DateRange { start, end })
            }
            (Some(_), None, _) | (None, Some(_), _) => Err(ValidationError::IncompleteDateRange),
            (None, None, Some(category)) => Ok(QuerySelector::Category(category)),
            (None, None, None) => Err(ValidationError::MissingQuerySelector),
        }
    }
}

/// One matching record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub content_id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub content_type: ContentType,
    pub source_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Present for similarity-ranked results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl QueryResult {
    fn from_record(record: ContentRecord, score: Option<f32>) -> Self {
        Self {
            content_id: record.id.to_string(),
            title: record.title,
            summary: record.summary,
            category: record.category,
            tags: record.tags,
            content_type: record.content_type,
            source_url: record.source_url,
            timestamp: record.timestamp,
            score,
        }
    }
}

/// Output of `query_content`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryContentResponse {
    pub results: Vec<QueryResult>,
}

/// Query by date range or category. With a category and `query_text`,
/// results are ranked by similarity within the category.
#[instrument(skip(manager, request))]
pub async fn query_content(
    manager: &ContentManager,
    request: QueryContentRequest,
) -> ContentResult<QueryContentResponse> {
    let selector = request.validate()?;
    let query_text = non_blank(request.query_text.as_deref());

    let results = match (selector, query_text) {
        (QuerySelector::DateRange { start, end }, _) => manager
            .retrieve_by_date_range(start, end, None, Some(request.k))
            .await?
            .into_iter()
            .map(|r| QueryResult::from_record(r, None))
            .collect(),
        (QuerySelector::Category(category), Some(text)) => manager
            .similarity_search(text, request.k, Some(category))
            .await?
            .into_iter()
            .map(|hit| QueryResult::from_record(hit.record, Some(hit.score)))
            .collect(),
        (QuerySelector::Category(category), None) => manager
            .retrieve_by_category(category, Some(request.k))
            .await?
            .into_iter()
            .map(|r| QueryResult::from_record(r, None))
            .collect(),
    };

    Ok(QueryContentResponse { results })
}

// ============================================================================
// generate_quiz
// ============================================================================

/// Input of `generate_quiz`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateQuizRequest {
    pub quiz_type: String,
    pub content_summaries: Vec<String>,
    pub category: String,
    #[serde(default = "default_num_questions")]
    pub num_questions: u32,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

impl GenerateQuizRequest {
    pub fn validate(&self) -> ContentResult<(QuizType, Difficulty)> {
        let quiz_type: QuizType = self
            .quiz_type
            .parse()
            .map_err(|e: crate::domain::UnsupportedQuizType| {
                ContentError::QuizGeneration(e.to_string())
            })?;
        if self.category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory.into());
        }
        if self.num_questions == 0 {
            return Err(ValidationError::NonPositiveQuestionCount.into());
        }
        let difficulty: Difficulty = self.difficulty.parse()?;
        if self.content_summaries.iter().all(|s| s.trim().is_empty()) {
            return Err(ValidationError::BlankSummaries.into());
        }
        Ok((quiz_type, difficulty))
    }
}

/// Generate a quiz from caller-provided summaries
#[instrument(skip(manager, request), fields(quiz_type = %request.quiz_type))]
pub async fn generate_quiz(
    manager: &ContentManager,
    request: GenerateQuizRequest,
) -> ContentResult<Quiz> {
    let (quiz_type, difficulty) = request.validate()?;
    manager
        .generate_quiz_from_summaries(
            request.content_summaries,
            &request.category,
            request.num_questions,
            difficulty,
            quiz_type,
        )
        .await
}

// ============================================================================
// Helpers
// ============================================================================

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse `YYYY-MM-DD` or RFC 3339. A bare end date covers its whole day.
pub fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))?;

    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}
