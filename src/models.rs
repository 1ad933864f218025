//! Data models for feed articles and their classification results.
//!
//! This module defines the core data structures passed between stages:
//! - [`Article`]: a feed entry, enriched and later classified and summarized
//! - [`CategoryRelevance`]: how well an article matches one configured category
//!
//! Articles are passed by value from stage to stage. Each stage hands back a
//! new version instead of mutating a shared one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single article as delivered by a feed.
///
/// The feed supplies everything up to `published`. The `summary` and
/// `category_relevance` fields start empty and are filled by the summarizer
/// and the classification engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// Short description from the feed; may be empty or discarded by the enricher.
    pub description: String,
    /// Article URL. Unique within a feed.
    pub link: String,
    /// Body text. Empty when neither the feed nor enrichment produced any.
    pub content: String,
    /// Publisher-supplied tags. Advisory only.
    pub categories: Vec<String>,
    /// Normalized publish timestamp.
    pub published: DateTime<Utc>,
    /// Summary produced for matched articles.
    #[serde(default)]
    pub summary: String,
    /// Categories that passed the relevance threshold.
    #[serde(default)]
    pub category_relevance: Vec<CategoryRelevance>,
}

impl Article {
    /// Build an article from the fields a feed entry carries.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
        content: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            link: link.into(),
            content: content.into(),
            categories: Vec::new(),
            published,
            summary: String::new(),
            category_relevance: Vec::new(),
        }
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snippet: String = self.content.chars().take(100).collect();
        write!(
            f,
            "Article: {}\nDescription: {}\nContent (snippet and size): {}... ({})\n\
             Link: {}\nPublished: {}\nCategories: {:?}",
            self.title,
            self.description,
            snippet,
            self.content.len(),
            self.link,
            self.published,
            self.categories
        )
    }
}

/// The relevance of one category to one article.
///
/// Relevance is a number between 0 (not relevant) and 10 (very relevant).
/// The LLM strategy answers with integers and an explanation; the embeddings
/// strategy produces `cosine × 10` with no explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRelevance {
    pub category: String,
    pub relevance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_category_relevance_accepts_integer_scores() {
        let json = r#"{"category": "Ransomware", "relevance": 9, "explanation": "LockBit"}"#;
        let parsed: CategoryRelevance = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.category, "Ransomware");
        assert_eq!(parsed.relevance, 9.0);
        assert_eq!(parsed.explanation.as_deref(), Some("LockBit"));
    }

    #[test]
    fn test_category_relevance_without_explanation() {
        let json = r#"{"category": "Supply chain", "relevance": 7.5}"#;
        let parsed: CategoryRelevance = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.explanation, None);

        let out = serde_json::to_string(&parsed).unwrap();
        assert!(!out.contains("explanation"));
    }

    #[test]
    fn test_article_display_truncates_content() {
        let published = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let article = Article::new(
            "Title",
            "Desc",
            "https://example.com/a",
            "x".repeat(500),
            published,
        );
        let shown = article.to_string();
        assert!(shown.contains(&format!("{}... (500)", "x".repeat(100))));
        assert!(!shown.contains(&"x".repeat(101)));
    }
}
