//! Persistent vector store backed by SQLite.
//!
//! Each record is one row: document text, the embedding as a little-endian
//! `f32` blob, and the flattened metadata columns. Tags and keywords are
//! JSON arrays, so no delimiter can corrupt them on read.
//!
//! Nearest-neighbour search is a brute-force cosine scan over the rows that
//! pass the metadata filter. Every failure surfaces as [`StoreError`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};

use super::content::{ContentId, ContentRecord, ContentType, StoredMetadata};
use crate::error::StoreError;

/// Rows fetched per page when scanning the whole collection
pub const SCAN_BATCH_SIZE: usize = 100;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    id             TEXT PRIMARY KEY,
    document       TEXT NOT NULL,
    embedding      BLOB NOT NULL,
    title          TEXT NOT NULL,
    summary        TEXT NOT NULL,
    category       TEXT NOT NULL,
    content_type   TEXT NOT NULL,
    tags           TEXT NOT NULL,
    url            TEXT,
    author         TEXT NOT NULL,
    abstract       TEXT NOT NULL,
    keywords       TEXT NOT NULL,
    date_published INTEGER NOT NULL,
    timestamp      INTEGER NOT NULL,
    citation       TEXT
);
CREATE INDEX IF NOT EXISTS idx_content_category ON content(category);
CREATE INDEX IF NOT EXISTS idx_content_timestamp ON content(timestamp);
"#;

const SELECT_COLUMNS: &str = "id, document, embedding, title, summary, category, content_type, \
     tags, url, author, abstract, keywords, date_published, timestamp, citation";

/// Metadata column a filter can address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Category,
    ContentType,
    Title,
    Author,
    Url,
    Timestamp,
    DatePublished,
}

impl MetadataField {
    fn column(&self) -> &'static str {
        match self {
            MetadataField::Category => "category",
            MetadataField::ContentType => "content_type",
            MetadataField::Title => "title",
            MetadataField::Author => "author",
            MetadataField::Url => "url",
            MetadataField::Timestamp => "timestamp",
            MetadataField::DatePublished => "date_published",
        }
    }
}

/// Value compared against a metadata column
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
}

impl From<FilterValue> for Value {
    fn from(v: FilterValue) -> Self {
        match v {
            FilterValue::Text(s) => Value::Text(s),
            FilterValue::Int(i) => Value::Integer(i),
        }
    }
}

/// Metadata `where` clause, applied as given
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Eq(MetadataField, FilterValue),
    Range {
        field: MetadataField,
        gte: Option<i64>,
        lte: Option<i64>,
    },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    /// Exact category match
    pub fn category(category: impl Into<String>) -> Self {
        MetadataFilter::Eq(MetadataField::Category, FilterValue::Text(category.into()))
    }

    /// Inclusive range on the write timestamp
    pub fn timestamp_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        MetadataFilter::Range {
            field: MetadataField::Timestamp,
            gte: Some(start.timestamp_millis()),
            lte: Some(end.timestamp_millis()),
        }
    }

    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            MetadataFilter::Eq(field, value) => {
                params.push(value.clone().into());
                format!("{} = ?", field.column())
            }
            MetadataFilter::Range { field, gte, lte } => {
                let mut parts = Vec::new();
                if let Some(gte) = gte {
                    params.push(Value::Integer(*gte));
                    parts.push(format!("{} >= ?", field.column()));
                }
                if let Some(lte) = lte {
                    params.push(Value::Integer(*lte));
                    parts.push(format!("{} <= ?", field.column()));
                }
                if parts.is_empty() {
                    "1 = 1".to_string()
                } else {
                    parts.join(" AND ")
                }
            }
            MetadataFilter::And(filters) => {
                if filters.is_empty() {
                    return "1 = 1".to_string();
                }
                let parts: Vec<String> = filters
                    .iter()
                    .map(|f| format!("({})", f.to_sql(params)))
                    .collect();
                parts.join(" AND ")
            }
        }
    }
}

/// One stored row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: ContentId,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: StoredMetadata,
}

impl StoredEntry {
    pub fn into_record(self) -> Result<ContentRecord, StoreError> {
        ContentRecord::from_stored(self.id, self.document, self.embedding, self.metadata)
    }
}

/// A stored row with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: StoredEntry,
    pub score: f32,
}

/// Aggregate view of the collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStatistics {
    pub total_content: usize,
    pub categories: BTreeMap<String, usize>,
    pub content_types: BTreeMap<String, usize>,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// SQLite-backed vector store
pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl VectorStore {
    /// Open (or create) a store at the given file path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "Vector store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a non-persistent store (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Backing file, if persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::InvalidRecord(format!("store task failed: {}", e)))?
    }

    /// Persist a record under its id and return that id
    pub async fn store(&self, record: &ContentRecord) -> Result<ContentId, StoreError> {
        if record.embedding.is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "record {} has an empty embedding",
                record.id
            )));
        }

        let id = record.id.clone();
        let document = record.original_content.clone();
        let embedding = encode_embedding(&record.embedding);
        let meta = record.to_stored();
        let tags = serde_json::to_string(&meta.tags)?;
        let keywords = serde_json::to_string(&meta.keywords)?;
        let row_id = id.as_str().to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO content (id, document, embedding, title, summary, category, \
                 content_type, tags, url, author, abstract, keywords, date_published, \
                 timestamp, citation) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    row_id,
                    document,
                    embedding,
                    meta.title,
                    meta.summary,
                    meta.category,
                    meta.content_type.as_str(),
                    tags,
                    meta.url,
                    meta.author,
                    meta.abstract_text,
                    keywords,
                    meta.date_published,
                    meta.timestamp,
                    meta.citation,
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!(%id, category = %record.category, "Stored record");
        Ok(id)
    }

    /// Nearest neighbours of `query_embedding`, best first
    pub async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let query = query_embedding.to_vec();
        let filter = filter.cloned();

        self.with_conn(move |conn| {
            let mut params = Vec::new();
            let where_clause = filter
                .as_ref()
                .map(|f| f.to_sql(&mut params))
                .unwrap_or_else(|| "1 = 1".to_string());
            let sql = format!("SELECT {} FROM content WHERE {}", SELECT_COLUMNS, where_clause);
            let entries = query_entries(conn, &sql, params)?;

            let mut scored: Vec<ScoredEntry> = entries
                .into_iter()
                .map(|entry| {
                    let score = cosine_similarity(&query, &entry.embedding);
                    ScoredEntry { entry, score }
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(k);
            Ok(scored)
        })
        .await
    }

    /// Records whose write timestamp lies in `[start, end]`, oldest first
    pub async fn query_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        k: Option<usize>,
        offset: usize,
        category: Option<&str>,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let mut filters = vec![MetadataFilter::timestamp_between(start, end)];
        if let Some(category) = category {
            filters.push(MetadataFilter::category(category));
        }
        let filter = MetadataFilter::And(filters);

        self.with_conn(move |conn| {
            let mut params = Vec::new();
            let where_clause = filter.to_sql(&mut params);
            params.push(limit_value(k));
            params.push(Value::Integer(offset as i64));
            let sql = format!(
                "SELECT {} FROM content WHERE {} ORDER BY timestamp ASC, rowid ASC \
                 LIMIT ? OFFSET ?",
                SELECT_COLUMNS, where_clause
            );
            query_entries(conn, &sql, params)
        })
        .await
    }

    /// Records in a category, most recent first
    pub async fn get_by_category(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let category = category.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM content WHERE category = ? \
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?",
                SELECT_COLUMNS
            );
            query_entries(conn, &sql, vec![Value::Text(category), limit_value(limit)])
        })
        .await
    }

    /// Records with the given ids, in the order requested; unknown ids are skipped
    pub async fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<StoredEntry>, StoreError> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM content WHERE id = ?", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let mut entries = Vec::new();
            for id in ids {
                let raw = stmt.query_row(params![id], RawRow::from_row).optional()?;
                if let Some(raw) = raw {
                    entries.push(raw.into_entry()?);
                }
            }
            Ok(entries)
        })
        .await
    }

    /// One page of the collection in insertion order
    pub async fn get_page(&self, offset: usize, limit: usize) -> Result<Vec<StoredEntry>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM content ORDER BY rowid ASC LIMIT ? OFFSET ?",
                SELECT_COLUMNS
            );
            query_entries(
                conn,
                &sql,
                vec![Value::Integer(limit as i64), Value::Integer(offset as i64)],
            )
        })
        .await
    }

    /// Visit every stored row in fixed-size batches until a short page
    async fn scan<F>(&self, mut visit: F) -> Result<(), StoreError>
    where
        F: FnMut(&StoredEntry),
    {
        let mut offset = 0;
        loop {
            let page = self.get_page(offset, SCAN_BATCH_SIZE).await?;
            for entry in &page {
                visit(entry);
            }
            if page.len() < SCAN_BATCH_SIZE {
                return Ok(());
            }
            offset += page.len();
        }
    }

    /// Every category in use, sorted
    pub async fn get_all_categories(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut categories = BTreeSet::new();
        self.scan(|entry| {
            categories.insert(entry.metadata.category.clone());
        })
        .await?;
        Ok(categories)
    }

    /// Every tag in use, sorted
    pub async fn get_all_tags(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut tags = BTreeSet::new();
        self.scan(|entry| {
            tags.extend(entry.metadata.tags.iter().cloned());
        })
        .await?;
        Ok(tags)
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }

    /// Totals grouped by category and content type, plus the timestamp span
    pub async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;

            let categories = grouped_counts(conn, "category")?;
            let content_types = grouped_counts(conn, "content_type")?;

            let (min, max): (Option<i64>, Option<i64>) = conn.query_row(
                "SELECT MIN(timestamp), MAX(timestamp) FROM content",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let date_range = match (min, max) {
                (Some(min), Some(max)) => Some((millis_to_utc(min)?, millis_to_utc(max)?)),
                _ => None,
            };

            Ok(StoreStatistics {
                total_content: total as usize,
                categories,
                content_types,
                date_range,
            })
        })
        .await
    }
}

/// Row as read from SQLite, before JSON columns are decoded
struct RawRow {
    id: String,
    document: String,
    embedding: Vec<u8>,
    title: String,
    summary: String,
    category: String,
    content_type: String,
    tags: String,
    url: Option<String>,
    author: String,
    abstract_text: String,
    keywords: String,
    date_published: i64,
    timestamp: i64,
    citation: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            document: row.get(1)?,
            embedding: row.get(2)?,
            title: row.get(3)?,
            summary: row.get(4)?,
            category: row.get(5)?,
            content_type: row.get(6)?,
            tags: row.get(7)?,
            url: row.get(8)?,
            author: row.get(9)?,
            abstract_text: row.get(10)?,
            keywords: row.get(11)?,
            date_published: row.get(12)?,
            timestamp: row.get(13)?,
            citation: row.get(14)?,
        })
    }

    fn into_entry(self) -> Result<StoredEntry, StoreError> {
        let content_type: ContentType = self
            .content_type
            .parse()
            .map_err(|e: crate::error::ValidationError| StoreError::InvalidRecord(e.to_string()))?;

        Ok(StoredEntry {
            id: ContentId::from_raw(self.id),
            document: self.document,
            embedding: decode_embedding(&self.embedding)?,
            metadata: StoredMetadata {
                title: self.title,
                summary: self.summary,
                category: self.category,
                content_type,
                tags: serde_json::from_str(&self.tags)?,
                url: self.url,
                author: self.author,
                abstract_text: self.abstract_text,
                keywords: serde_json::from_str(&self.keywords)?,
                date_published: self.date_published,
                timestamp: self.timestamp,
                citation: self.citation,
            },
        })
    }
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<StoredEntry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), RawRow::from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

fn grouped_counts(conn: &Connection, column: &str) -> Result<BTreeMap<String, usize>, StoreError> {
    let sql = format!("SELECT {col}, COUNT(*) FROM content GROUP BY {col}", col = column);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (key, count) = row?;
        counts.insert(key, count as usize);
    }
    Ok(counts)
}

/// SQLite treats a negative LIMIT as "no limit"
fn limit_value(limit: Option<usize>) -> Value {
    Value::Integer(limit.map(|l| l as i64).unwrap_or(-1))
}

fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::InvalidRecord(format!("timestamp out of range: {}", millis)))
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::InvalidRecord(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
