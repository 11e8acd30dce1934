use crate::domain::{errors::DomainError, Embedding, EmbeddingIdentity};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError>;
    /// Returns exactly one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;
    fn identity(&self) -> EmbeddingIdentity;

    fn dimension(&self) -> usize {
        self.identity().dimension
    }
}
