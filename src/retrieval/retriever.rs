//! Over-fetching similarity retrieval

use super::{Candidate, SearchError};
use crate::config::RecommendConfig;
use crate::embedding::EmbeddingProvider;
use crate::records::DocType;
use crate::store::{Collection, Predicate};
use std::sync::Arc;
use tracing::{debug, warn};

/// Unranked result of [`Retriever::retrieve`]
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    pub candidates: Vec<Candidate>,
    /// Whether the requested variant filter was applied by the store.
    /// `false` means the rerank stage must enforce it.
    pub variant_enforced: bool,
}

impl CandidatePool {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Pool sizing for retrieval
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub overfetch_factor: usize,
    pub min_candidates: usize,
}

impl RetrievalConfig {
    pub fn from_config(config: &RecommendConfig) -> Self {
        Self {
            overfetch_factor: config.overfetch_factor,
            min_candidates: config.min_candidates,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 5,
            min_candidates: 20,
        }
    }
}

/// Embeds a query once and fetches an over-sized candidate pool
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: RetrievalConfig) -> Self {
        Self { provider, config }
    }

    /// Number of candidates requested for a final result of `k`
    pub fn fetch_size(&self, k: usize) -> usize {
        k.saturating_mul(self.config.overfetch_factor)
            .max(self.config.min_candidates)
    }

    /// Fetch candidates for `query_text`.
    ///
    /// A variant filter is pushed down to the store; if the store rejects it
    /// the query is repeated unfiltered and the pool is marked so reranking
    /// applies the filter instead.
    pub fn retrieve<C: Collection>(
        &self,
        query_text: &str,
        collection: &C,
        k: usize,
        doc_type: Option<DocType>,
    ) -> Result<CandidatePool, SearchError> {
        let vector = self.provider.embed(query_text)?;
        let fetch = self.fetch_size(k);

        let (hits, variant_enforced) = match doc_type {
            Some(doc_type) => {
                let predicate = Predicate::DocType(doc_type);
                match collection.query(&vector, fetch, Some(&predicate)) {
                    Ok(hits) => (hits, true),
                    Err(e) => {
                        warn!(
                            "Store rejected '{}' filter ({}), falling back to unfiltered query",
                            doc_type, e
                        );
                        (collection.query(&vector, fetch, None)?, false)
                    }
                }
            }
            None => (collection.query(&vector, fetch, None)?, true),
        };

        debug!(
            "Retrieved {} candidates (requested {}) from '{}'",
            hits.len(),
            fetch,
            collection.name()
        );

        Ok(CandidatePool {
            candidates: hits.into_iter().map(Candidate::from_hit).collect(),
            variant_enforced,
        })
    }
}
