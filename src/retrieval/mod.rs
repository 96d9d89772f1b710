//! Retrieval, reranking, and recommendation
//!
//! A query is embedded once, an over-sized candidate pool is fetched from the
//! index store, and the pool is narrowed and ordered by the rerank stages.

mod candidate;
mod recommend;
mod rerank;
mod retriever;

pub use candidate::{Candidate, CandidateDetail, Recommendation};
pub use recommend::Recommender;
pub use rerank::{
    annotate_keywords, apply_variant_backstop, filter_department, filter_languages,
    query_keywords, rerank, sort_candidates, RerankOptions,
};
pub use retriever::{CandidatePool, RetrievalConfig, Retriever};

use crate::embedding::EmbeddingError;
use crate::records::DocType;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index query failed: {0}")]
    Store(#[from] StoreError),
}

/// Recommendation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendQuery {
    /// Project or role description; blank falls back to the configured default
    pub text: String,

    /// Maximum number of results
    pub limit: usize,

    /// Optional department filter
    pub department: Option<String>,

    /// Languages every employee result must speak
    pub languages: Vec<String>,

    /// Optional restriction to one record variant
    pub doc_type: Option<DocType>,
}

impl RecommendQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            ..Default::default()
        }
    }

    /// Blank input clears the filter
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        let department = department.into();
        let trimmed = department.trim();
        self.department = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_doc_type(mut self, doc_type: Option<DocType>) -> Self {
        self.doc_type = doc_type;
        self
    }

    /// Query text, or `default` when the text is blank
    pub fn effective_text<'a>(&'a self, default: &'a str) -> &'a str {
        let text = self.text.trim();
        if text.is_empty() {
            default
        } else {
            text
        }
    }
}

/// Split a comma-separated language list, dropping blanks
pub fn parse_languages(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_languages() {
        assert_eq!(
            parse_languages("English, Korean ,,  "),
            vec!["English", "Korean"]
        );
        assert!(parse_languages("").is_empty());
    }

    #[test]
    fn test_query_defaults() {
        let query = RecommendQuery::new("   ", 5).with_department("  ");
        assert_eq!(
            query.effective_text("software development project"),
            "software development project"
        );
        assert!(query.department.is_none());

        let query = RecommendQuery::new(" web services ", 3).with_department(" R&D ");
        assert_eq!(query.effective_text("unused"), "web services");
        assert_eq!(query.department.as_deref(), Some("R&D"));
    }
}
