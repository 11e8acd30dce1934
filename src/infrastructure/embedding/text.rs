use async_trait::async_trait;
use rig::client::{EmbeddingsClient, ProviderClient};
use rig::embeddings::EmbeddingModel as _;
use rig::providers::openai;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::{ports::EmbeddingService, DomainError, Embedding, EmbeddingIdentity};
use crate::infrastructure::config::EmbeddingConfig;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible embedder. Every vector it returns is checked against the
/// configured dimension so a model swap cannot leak into the index.
pub struct TextEmbedding {
    client: openai::Client,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl TextEmbedding {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, DomainError> {
        if std::env::var(API_KEY_ENV).map_or(true, |key| key.is_empty()) {
            return Err(DomainError::invalid_config(format!("{API_KEY_ENV} is not set")));
        }

        Ok(Self {
            client: openai::Client::from_env(),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }
}

fn to_embedding(vec: Vec<f64>, dimension: usize) -> Result<Embedding, DomainError> {
    if vec.len() != dimension {
        return Err(DomainError::DimensionMismatch {
            expected: dimension,
            actual: vec.len(),
        });
    }
    Ok(Embedding::new(vec.into_iter().map(|x| x as f32).collect()))
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("No embedding returned"))
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self
            .client
            .embedding_model_with_ndims(&self.model, self.dimension);
        let documents: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

        let embeddings = tokio::time::timeout(self.timeout, model.embed_texts(documents))
            .await
            .map_err(|_| DomainError::embedding(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| DomainError::embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(DomainError::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        debug!("embedded batch");
        embeddings
            .into_iter()
            .map(|e| to_embedding(e.vec, self.dimension))
            .collect()
    }

    fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity::new(&self.model, self.dimension)
    }
}
