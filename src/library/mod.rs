//! Content library: records and the vector store that persists them.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.canvas/
//! └── store.db      # SQLite: one row per record (document, embedding, metadata)
//! ```

pub mod content;
pub mod store;

pub use content::{
    Classification, ContentId, ContentMetadata, ContentRecord, ContentSource, ContentType,
    RawMetadata, StoredMetadata, UNKNOWN_AUTHOR,
};
pub use store::{
    cosine_similarity, FilterValue, MetadataField, MetadataFilter, ScoredEntry, StoreStatistics,
    StoredEntry, VectorStore,
};
