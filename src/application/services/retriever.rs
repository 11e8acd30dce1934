use std::sync::Arc;
use tracing::{debug, instrument};

use crate::application::RetryPolicy;
use crate::domain::{
    ports::{EmbeddingService, SearchFilter, VectorStore},
    DomainError, RetrievalResult, SearchResult,
};

pub struct Retriever {
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
}

impl Retriever {
    /// Fails when the embedder is not the model the index was built with.
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self, DomainError> {
        vector_store.identity().ensure_matches(&embedding.identity())?;
        Ok(Self {
            embedding,
            vector_store,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(skip(self, query))]
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<RetrievalResult, DomainError> {
        self.retrieve_filtered(query, k, min_score, None).await
    }

    /// Embeds `query`, takes the `k` nearest chunks and drops every candidate
    /// scoring below `min_score`.
    #[instrument(skip(self, query, filter))]
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
        filter: Option<&SearchFilter>,
    ) -> Result<RetrievalResult, DomainError> {
        if k == 0 {
            return Err(DomainError::invalid_config("k must be greater than zero"));
        }
        if !min_score.is_finite() {
            return Err(DomainError::invalid_config("min_score must be a finite number"));
        }

        let embedding = self
            .retry
            .run("embed query", || self.embedding.embed(query))
            .await?;

        let candidates = self
            .retry
            .run("search index", || self.vector_store.search(&embedding, k, filter))
            .await?;

        let candidate_count = candidates.len();
        let kept: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|r| r.score >= min_score)
            .collect();

        debug!(
            candidate_count,
            result_count = kept.len(),
            "retrieval filtered by relevance threshold"
        );

        Ok(RetrievalResult::new(kept))
    }
}
