use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::application::RetryPolicy;
use crate::domain::{ChunkerConfig, DomainError, EmbeddingIdentity};

pub const CONFIG_PATH_ENV: &str = "RAG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub config: Config,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub rag: RagConfig,
    pub ingest: IngestConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 384,
            timeout_seconds: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity::new(&self.model, self.dimension)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    pub timeout_seconds: u64,
    /// Only ever read from `QDRANT_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "fragments_to_thought".to_string(),
            timeout_seconds: 60,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Defaults to a fifth of `chunk_size`.
    pub boundary_window: Option<usize>,
    pub top_k: usize,
    pub min_score: f32,
    pub max_context_chars: usize,
    pub history_turns: usize,
    pub refusal_message: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            boundary_window: None,
            top_k: 5,
            min_score: 0.3,
            max_context_chars: 4000,
            history_turns: 5,
            refusal_message: "I don't know based on the provided context.".to_string(),
        }
    }
}

impl RagConfig {
    pub fn chunker(&self) -> ChunkerConfig {
        let config = ChunkerConfig::new(self.chunk_size, self.chunk_overlap);
        match self.boundary_window {
            Some(window) => config.with_boundary_window(window),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub corpus_dir: PathBuf,
    pub extensions: Vec<String>,
    pub embed_batch_size: usize,
    pub embed_concurrency: usize,
    pub upsert_batch_size: usize,
    /// Drop and recreate the collection before ingesting.
    pub rebuild: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data/books"),
            extensions: vec!["md".to_string()],
            embed_batch_size: 32,
            embed_concurrency: 4,
            upsert_batch_size: 10,
            rebuild: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 4000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub generator: GeneratorPrompts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorPrompts {
    pub system: String,
    /// Placeholders: `{context}`, `{question}`, `{history}`.
    pub template: String,
}

impl Default for GeneratorPrompts {
    fn default() -> Self {
        Self {
            system: "You're an AI assistant that answers strictly based on the context.".to_string(),
            template: "\
You are a highly knowledgeable assistant trained to answer based strictly on the given context.

CONTEXT:
{context}
{history}
QUESTION:
{question}

INSTRUCTIONS:
- If the context is relevant, give a complete, clear answer.
- If the context is vague or doesn't have the answer, respond only with: \"I don't know based on the provided context.\"
- Do not add information that is not in the context."
                .to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `path` as YAML; missing sections and fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(raw).map_err(|e| DomainError::invalid_config(e.to_string()))
    }

    /// Loads the file named by `RAG_CONFIG` (or the default path when it
    /// exists), applies environment overrides and validates the result.
    pub fn load() -> Result<Self, DomainError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            None => {
                info!("no config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.config.vector_store.url = url;
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            self.config.vector_store.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Ok(collection) = std::env::var("RAG_COLLECTION") {
            self.config.vector_store.collection = collection;
        }
        if let Ok(dir) = std::env::var("RAG_CORPUS_DIR") {
            self.config.ingest.corpus_dir = PathBuf::from(dir);
        }
        debug!(
            collection = %self.config.vector_store.collection,
            "environment overrides applied"
        );
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let c = &self.config;
        c.rag.chunker().validate()?;

        if c.rag.top_k == 0 {
            return Err(DomainError::invalid_config("rag.top_k must be greater than zero"));
        }
        if !c.rag.min_score.is_finite() {
            return Err(DomainError::invalid_config("rag.min_score must be a finite number"));
        }
        if c.rag.max_context_chars == 0 {
            return Err(DomainError::invalid_config(
                "rag.max_context_chars must be greater than zero",
            ));
        }
        if c.embedding.dimension == 0 {
            return Err(DomainError::invalid_config(
                "embedding.dimension must be greater than zero",
            ));
        }
        if c.ingest.embed_batch_size == 0
            || c.ingest.embed_concurrency == 0
            || c.ingest.upsert_batch_size == 0
        {
            return Err(DomainError::invalid_config(
                "ingest batch sizes and concurrency must be greater than zero",
            ));
        }
        if c.retry.max_attempts == 0 {
            return Err(DomainError::invalid_config("retry.max_attempts must be at least 1"));
        }
        for placeholder in ["{context}", "{question}"] {
            if !self.prompts.generator.template.contains(placeholder) {
                return Err(DomainError::invalid_config(format!(
                    "prompts.generator.template must contain {placeholder}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.config.rag.chunk_size, 1000);
        assert_eq!(config.config.rag.chunk_overlap, 200);
        assert_eq!(config.config.vector_store.collection, "fragments_to_thought");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = AppConfig::from_yaml(include_str!("../../config/default.yaml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.config.embedding.dimension, 384);
        assert_eq!(config.config.ingest.upsert_batch_size, 10);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            r#"
rag:
  top_k: 8
  min_score: 0.45
vector_store:
  collection: resume
prompts:
  generator:
    system: "Answer from context only."
"#,
        )
        .unwrap();

        assert_eq!(config.config.rag.top_k, 8);
        assert!((config.config.rag.min_score - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.config.rag.chunk_size, 1000);
        assert_eq!(config.config.vector_store.collection, "resume");
        assert_eq!(config.prompts.generator.system, "Answer from context only.");
        assert!(config.prompts.generator.template.contains("{context}"));
    }

    #[test]
    fn test_overlap_not_less_than_chunk_size_is_invalid() {
        let config = AppConfig::from_yaml("rag:\n  chunk_size: 200\n  chunk_overlap: 200\n").unwrap();
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));
    }

    #[test]
    fn test_template_without_question_is_invalid() {
        let mut config = AppConfig::default();
        config.prompts.generator.template = "{context}".to_string();
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));
    }

    #[test]
    fn test_boundary_window_override() {
        let config = AppConfig::from_yaml("rag:\n  chunk_size: 500\n  boundary_window: 40\n").unwrap();
        assert_eq!(config.config.rag.chunker().boundary_window, 40);
        assert_eq!(AppConfig::default().config.rag.chunker().boundary_window, 200);
    }
}
