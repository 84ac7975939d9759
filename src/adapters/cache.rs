//! Categorization cache.
//!
//! Keyed by a SHA-256 of title and content. Entries never expire; the first
//! value stored under a key wins.

use std::collections::HashMap;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::domain::CategoryResult;

/// Storage for categorization results
pub trait CategoryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CategoryResult>;

    /// Insert if absent
    fn put(&self, key: &str, value: CategoryResult);
}

/// Cache key for a (title, content) pair
pub fn cache_key(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Unbounded in-process cache
#[derive(Default)]
pub struct MemoryCategoryCache {
    entries: RwLock<HashMap<String, CategoryResult>>,
}

impl MemoryCategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CategoryCache for MemoryCategoryCache {
    fn get(&self, key: &str) -> Option<CategoryResult> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: CategoryResult) {
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(key.to_string()).or_insert(value);
        }
    }
}
