//! Core workflow logic.
//!
//! This module contains:
//! - ContentManager: ingestion, retrieval and quiz workflows
//! - RetryPolicy: retry of transient failures

pub mod manager;
pub mod retry;

// Re-export commonly used types
pub use manager::{
    BulkFailure, BulkResult, BulkSuccess, ContentManager, Providers, SearchHit,
    DEFAULT_TEXT_TITLE,
};
pub use retry::{RetryPolicy, Retryable};
