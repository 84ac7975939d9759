//! Categorization results.

use serde::{Deserialize, Serialize};

/// Structured output of the categorization provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: String,
    /// In `[0.0, 1.0]`
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

impl CategoryResult {
    /// Trim fields, drop blank tags and clamp confidence into range
    pub fn normalized(mut self) -> Self {
        self.category = self.category.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized() {
        let result = CategoryResult {
            category: "  Technology ".to_string(),
            confidence: 1.7,
            tags: vec!["AI".to_string(), "  ".to_string(), " ML ".to_string()],
            summary: " text ".to_string(),
        }
        .normalized();

        assert_eq!(result.category, "Technology");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.tags, vec!["AI", "ML"]);
        assert_eq!(result.summary, "text");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let result: CategoryResult = serde_json::from_str(r#"{"category": "Science"}"#).unwrap();
        assert_eq!(result.category, "Science");
        assert!(result.tags.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
