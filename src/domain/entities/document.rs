use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Embedding;

/// Namespace for chunk ids, so that `(source_id, sequence_index)` always maps
/// to the same point id across ingestion runs.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_52d4_4c1b_9a7e_3d0b_8e51_c2f4);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable source path or name; doubles as the `source_id` of its chunks.
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub source_id: String,
    pub text: String,
    pub sequence_index: usize,
    /// Span in the source document, in characters, end exclusive.
    pub char_start: usize,
    pub char_end: usize,
}

impl Chunk {
    pub fn new(
        source_id: impl Into<String>,
        text: impl Into<String>,
        sequence_index: usize,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: Self::id_for(&source_id, sequence_index),
            source_id,
            text: text.into(),
            sequence_index,
            char_start,
            char_end,
        }
    }

    pub fn id_for(source_id: &str, sequence_index: usize) -> Uuid {
        Uuid::new_v5(
            &CHUNK_ID_NAMESPACE,
            format!("{source_id}#{sequence_index}").as_bytes(),
        )
    }

    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// A chunk together with the vector it was indexed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

impl IndexEntry {
    pub fn new(chunk: Chunk, embedding: Embedding) -> Self {
        Self { chunk, embedding }
    }

    pub fn id(&self) -> Uuid {
        self.chunk.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Candidates that survived the relevance threshold, highest score first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    results: Vec<SearchResult>,
}

impl RetrievalResult {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self { results }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[SearchResult] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_stable() {
        let a = Chunk::new("notes/harsha.md", "text", 3, 0, 4);
        let b = Chunk::new("notes/harsha.md", "other text", 3, 10, 20);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_chunk_id_differs_by_source_and_index() {
        assert_ne!(Chunk::id_for("a.md", 0), Chunk::id_for("a.md", 1));
        assert_ne!(Chunk::id_for("a.md", 0), Chunk::id_for("b.md", 0));
    }

    #[test]
    fn test_retrieval_result_len() {
        let empty = RetrievalResult::default();
        assert!(empty.is_empty());

        let result = RetrievalResult::new(vec![SearchResult {
            chunk: Chunk::new("a.md", "hello", 0, 0, 5),
            score: 0.8,
        }]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.as_slice()[0].score, 0.8);
    }
}
