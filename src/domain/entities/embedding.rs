use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(vec: Vec<f32>) -> Self {
        Self(vec)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }

        let dot_product: f32 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        let norm_a: f32 = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vec: Vec<f32>) -> Self {
        Self(vec)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// The model that produced a set of vectors. Two identities must be equal
/// for their vectors to be comparable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingIdentity {
    pub model: String,
    pub dimension: usize,
}

impl EmbeddingIdentity {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }

    /// Fails when vectors from `other` cannot be compared with ours.
    pub fn ensure_matches(&self, other: &EmbeddingIdentity) -> Result<(), DomainError> {
        if self.dimension != other.dimension {
            return Err(DomainError::DimensionMismatch {
                expected: self.dimension,
                actual: other.dimension,
            });
        }
        if self.model != other.model {
            return Err(DomainError::EmbeddingModelMismatch {
                expected: self.model.clone(),
                actual: other.model.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = Embedding::new(vec![0.3, 0.4, 0.0]);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_dimension_mismatch_is_zero() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }

    #[test]
    fn test_identity_mismatch() {
        let index = EmbeddingIdentity::new("all-MiniLM-L6-v2", 384);

        assert!(index.ensure_matches(&index.clone()).is_ok());
        assert!(matches!(
            index.ensure_matches(&EmbeddingIdentity::new("all-MiniLM-L6-v2", 768)),
            Err(DomainError::DimensionMismatch { expected: 384, actual: 768 })
        ));
        assert!(matches!(
            index.ensure_matches(&EmbeddingIdentity::new("bge-small-en", 384)),
            Err(DomainError::EmbeddingModelMismatch { .. })
        ));
    }
}
