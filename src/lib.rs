//! cognitive-canvas - Content ingestion and quiz generation assistant
//!
//! Ingests web pages, raw text and code snippets, classifies and embeds
//! them through an OpenAI-compatible provider, persists them in a local
//! vector store, and turns stored summaries into quizzes.
//!
//! # Modules
//!
//! - `adapters`: External providers (HTTP extractor, OpenAI client,
//!   categorizer, quiz generator, category cache)
//! - `core`: Workflow orchestration (ContentManager, RetryPolicy)
//! - `domain`: Quiz and category types
//! - `library`: Content records and the SQLite vector store
//! - `tools`: JSON-shaped entry points for agents
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Ingest a page
//! canvas ingest https://example.com/article
//!
//! # Search and quiz
//! canvas search "ownership and borrowing"
//! canvas quiz --category Programming --type mcq
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod library;
pub mod tools;

// Re-export main types at crate root for convenience
pub use core::{BulkResult, ContentManager, Providers, RetryPolicy, SearchHit};
pub use domain::{CategoryResult, Difficulty, Quiz, QuizQuestion, QuizType};
pub use error::{ContentError, ContentResult, ProviderError, StoreError, ValidationError};
pub use library::{ContentId, ContentRecord, ContentType, VectorStore};
