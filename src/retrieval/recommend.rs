//! End-to-end recommendation over a synchronized collection

use super::{
    rerank, RecommendQuery, Recommendation, RerankOptions, RetrievalConfig, Retriever, SearchError,
};
use crate::config::RecommendConfig;
use crate::embedding::EmbeddingProvider;
use crate::store::Collection;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Retriever plus rerank stages, configured once
pub struct Recommender {
    retriever: Retriever,
    default_query: String,
}

impl Recommender {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &RecommendConfig) -> Self {
        Self {
            retriever: Retriever::new(provider, RetrievalConfig::from_config(config)),
            default_query: config.default_query.clone(),
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Rank the best `query.limit` matches in `collection`
    pub fn recommend<C: Collection>(
        &self,
        collection: &C,
        query: &RecommendQuery,
    ) -> Result<Vec<Recommendation>, SearchError> {
        let start = Instant::now();

        if collection.count()? == 0 {
            info!("Collection '{}' is empty, nothing to rank", collection.name());
            return Ok(Vec::new());
        }

        let text = query.effective_text(&self.default_query);
        let pool = self
            .retriever
            .retrieve(text, collection, query.limit, query.doc_type)?;
        let pooled = pool.len();

        let options = RerankOptions {
            query_text: text,
            k: query.limit,
            department: query.department.as_deref(),
            languages: &query.languages,
            doc_type: query.doc_type,
        };
        let ranked = rerank(pool, &options);

        debug!(
            "Ranked {} of {} candidates for '{}' in {}ms",
            ranked.len(),
            pooled,
            text,
            start.elapsed().as_millis()
        );

        Ok(ranked.into_iter().map(Recommendation::from).collect())
    }
}
