//! Content records and their stored shape.
//!
//! A [`ContentRecord`] is built once per successful ingestion and never
//! mutated afterwards. The store persists a flattened copy
//! ([`StoredMetadata`]) alongside the document text and the embedding.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Author used when the source does not report one
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Content identifier (UUID v4, assigned when the record is built)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// Allocate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier read back from the store
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of ingested content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Fetched from a URL
    Url,

    /// Raw prose
    Text,

    /// Source code snippet
    Code,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Url => "url",
            ContentType::Text => "text",
            ContentType::Code => "code",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "url" | "web" => Ok(ContentType::Url),
            "text" => Ok(ContentType::Text),
            "code" => Ok(ContentType::Code),
            other => Err(crate::error::ValidationError::UnsupportedContentType(
                other.to_string(),
            )),
        }
    }
}

/// Where a record came from. Ties `source_url` to `content_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Url(String),
    Text,
    Code,
}

impl ContentSource {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentSource::Url(_) => ContentType::Url,
            ContentSource::Text => ContentType::Text,
            ContentSource::Code => ContentType::Code,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ContentSource::Url(url) => Some(url),
            _ => None,
        }
    }
}

/// Bibliographic metadata attached to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Same identifier as the owning record
    pub id: ContentId,
    pub title: String,
    pub author: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub date_published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

/// Optional metadata fields as reported by an extractor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub author: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub citation: Option<String>,
}

impl ContentMetadata {
    /// Build metadata, applying the defaults for missing fields.
    ///
    /// `now` is the write time of the record; a missing publication date
    /// defaults to it.
    pub fn from_raw(id: ContentId, title: &str, raw: RawMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.to_string(),
            author: raw
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            abstract_text: raw.abstract_text.unwrap_or_default(),
            keywords: raw.keywords,
            date_published: raw.date_published.unwrap_or(now),
            citation: raw.citation,
        }
    }
}

/// A stored, immutable unit of ingested material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    pub original_content: String,
    pub content_type: ContentType,
    pub title: String,
    pub summary: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub metadata: ContentMetadata,
}

/// Derived fields produced by categorization (or supplied by the caller)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub category: String,
    pub tags: Vec<String>,
    pub summary: String,
}

impl ContentRecord {
    /// Assemble a new record. The id is allocated here and shared with the
    /// metadata; `timestamp` is the write time.
    pub fn new(
        source: ContentSource,
        original_content: impl Into<String>,
        title: impl Into<String>,
        classification: Classification,
        embedding: Vec<f32>,
        raw_metadata: RawMetadata,
    ) -> Self {
        let id = ContentId::generate();
        let title = title.into();
        let now = Utc::now();
        let metadata = ContentMetadata::from_raw(id.clone(), &title, raw_metadata, now);

        Self {
            id,
            original_content: original_content.into(),
            content_type: source.content_type(),
            title,
            summary: classification.summary,
            category: classification.category,
            tags: classification.tags,
            embedding,
            timestamp: now,
            source_url: source.url().map(str::to_string),
            metadata,
        }
    }

    /// Flatten into the metadata shape persisted by the store
    pub fn to_stored(&self) -> StoredMetadata {
        StoredMetadata {
            title: self.title.clone(),
            summary: self.summary.clone(),
            category: self.category.clone(),
            content_type: self.content_type,
            tags: self.tags.clone(),
            url: self.source_url.clone(),
            author: self.metadata.author.clone(),
            abstract_text: self.metadata.abstract_text.clone(),
            keywords: self.metadata.keywords.clone(),
            date_published: self.metadata.date_published.timestamp_millis(),
            timestamp: self.timestamp.timestamp_millis(),
            citation: self.metadata.citation.clone(),
        }
    }

    /// Rebuild a record from what the store returned
    pub fn from_stored(
        id: ContentId,
        document: String,
        embedding: Vec<f32>,
        stored: StoredMetadata,
    ) -> Result<Self, StoreError> {
        let source = match (stored.content_type, stored.url) {
            (ContentType::Url, Some(url)) => ContentSource::Url(url),
            (ContentType::Url, None) => {
                return Err(StoreError::InvalidRecord(format!(
                    "record {} has content_type url but no source url",
                    id
                )))
            }
            (ContentType::Text, _) => ContentSource::Text,
            (ContentType::Code, _) => ContentSource::Code,
        };

        let timestamp = millis_to_datetime(stored.timestamp)?;
        let date_published = millis_to_datetime(stored.date_published)?;

        let metadata = ContentMetadata {
            id: id.clone(),
            title: stored.title.clone(),
            author: if stored.author.is_empty() {
                UNKNOWN_AUTHOR.to_string()
            } else {
                stored.author
            },
            abstract_text: stored.abstract_text,
            keywords: stored.keywords,
            date_published,
            citation: stored.citation,
        };

        Ok(Self {
            id,
            original_content: document,
            content_type: source.content_type(),
            title: stored.title,
            summary: stored.summary,
            category: stored.category,
            tags: stored.tags,
            embedding,
            timestamp,
            source_url: source.url().map(str::to_string),
            metadata,
        })
    }
}

/// Flattened metadata persisted next to each document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMetadata {
    pub title: String,
    pub summary: String,
    pub category: String,
    pub content_type: ContentType,
    /// Stored as a JSON array, so tags may contain any character
    pub tags: Vec<String>,
    pub url: Option<String>,
    pub author: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    /// Unix milliseconds
    pub date_published: i64,
    /// Unix milliseconds, write time
    pub timestamp: i64,
    pub citation: Option<String>,
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::InvalidRecord(format!("timestamp out of range: {}", millis)))
}
