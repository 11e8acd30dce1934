use crate::domain::{
    errors::DomainError, Chunk, Embedding, EmbeddingIdentity, IndexEntry, SearchResult,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Restricts a search to chunks from the listed sources. An empty list
/// matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub source_ids: Vec<String>,
}

impl SearchFilter {
    pub fn source(source_id: impl Into<String>) -> Self {
        Self {
            source_ids: vec![source_id.into()],
        }
    }

    pub fn matches(&self, source_id: &str) -> bool {
        self.source_ids.iter().any(|s| s == source_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteSelector {
    Ids(Vec<Uuid>),
    /// Every chunk of one document.
    Source(String),
    /// Chunks of one document with `sequence_index >= keep`, left over from a
    /// longer previous version.
    StaleChunks { source_id: String, keep: usize },
}

impl DeleteSelector {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Self::Ids(ids) => ids.contains(&chunk.id),
            Self::Source(source_id) => chunk.source_id == *source_id,
            Self::StaleChunks { source_id, keep } => {
                chunk.source_id == *source_id && chunk.sequence_index >= *keep
            }
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The embedding model this index was built with.
    fn identity(&self) -> &EmbeddingIdentity;

    /// Inserts or replaces entries by id.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), DomainError>;

    /// At most `top_k` results, best first; equal scores put the most
    /// recently written entry first.
    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn delete(&self, selector: &DeleteSelector) -> Result<(), DomainError>;

    /// Rejects vectors of the wrong dimension or with NaN or infinite
    /// components.
    fn check_embedding(&self, embedding: &Embedding) -> Result<(), DomainError> {
        let expected = self.identity().dimension;
        if embedding.dimension() != expected {
            return Err(DomainError::DimensionMismatch {
                expected,
                actual: embedding.dimension(),
            });
        }
        if embedding.as_slice().iter().any(|x| !x.is_finite()) {
            return Err(DomainError::validation("embedding has non-finite components"));
        }
        Ok(())
    }
}
