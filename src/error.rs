//! Error taxonomy.
//!
//! Provider and store failures are caught where they happen and re-raised
//! as the nearest [`ContentError`], so callers of the content manager only
//! ever see these four kinds.

use thiserror::Error;

/// Failure of an external provider call (extraction, embedding, completion)
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP error: {status}: {message}")]
    Http { status: u16, message: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl ProviderError {
    /// Connectivity and timeout failures, plus rate limiting and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::Connection(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else if e.is_connect() {
            ProviderError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            ProviderError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Api(e.to_string())
        }
    }
}

/// Store-layer failure. Every underlying error surfaces as this one type.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Vector database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Vector database error: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Vector database error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vector database error: connection lock poisoned")]
    LockPoisoned,

    #[error("Vector database error: {0}")]
    InvalidRecord(String),
}

/// Input rejected before any I/O was attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Content must not be empty")]
    EmptyContent,

    #[error("{field} is required for content_type '{content_type}'")]
    MissingField {
        field: &'static str,
        content_type: String,
    },

    #[error("Unsupported content_type: {0}")]
    UnsupportedContentType(String),

    #[error("Number of questions must be greater than zero")]
    NonPositiveQuestionCount,

    #[error("Difficulty must be one of: easy, medium, hard, mixed (got '{0}')")]
    InvalidDifficulty(String),

    #[error("Category must be a non-empty string")]
    EmptyCategory,

    #[error("Content summaries cannot be blank")]
    BlankSummaries,

    #[error("Either start_date and end_date, or category must be provided")]
    MissingQuerySelector,

    #[error("Provide either a date range or a category, not both")]
    AmbiguousQuerySelector,

    #[error("Both start_date and end_date are required for a date range query")]
    IncompleteDateRange,

    #[error("Invalid date '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),

    #[error("start_date must not be after end_date")]
    InvertedDateRange,

    #[error("k must be greater than zero")]
    NonPositiveLimit,
}

/// Errors returned by the content manager and the tool layer
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content storage failed: {0}")]
    ContentStorage(String),

    #[error("Content retrieval failed: {0}")]
    ContentRetrieval(String),

    #[error("Quiz generation failed: {0}")]
    QuizGeneration(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

pub type ContentResult<T> = std::result::Result<T, ContentError>;
