use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Generation backend error: {0}")]
    GenerationBackend(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding model mismatch: collection built with '{expected}', embedder is '{actual}'")]
    EmbeddingModelMismatch { expected: String, actual: String },

    #[error("Service unavailable: {operation} failed after {attempts} attempts")]
    ServiceUnavailable {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: Box<DomainError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingService(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::GenerationBackend(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Backend failures that may succeed on a later attempt.
    ///
    /// Configuration drift (dimension or model mismatch) and invalid
    /// parameters are never transient: retrying cannot fix them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingService(_) | Self::IndexUnavailable(_) | Self::GenerationBackend(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
