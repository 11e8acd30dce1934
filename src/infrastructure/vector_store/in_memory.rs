use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    ports::{DeleteSelector, SearchFilter, VectorStore},
    DomainError, Embedding, EmbeddingIdentity, IndexEntry, SearchResult,
};

struct StoredEntry {
    entry: IndexEntry,
    /// Write order, used to break score ties in favour of newer entries.
    revision: u64,
}

/// Process-local index for tests and small corpora. Nothing survives a restart.
pub struct InMemoryVectorStore {
    identity: EmbeddingIdentity,
    entries: RwLock<HashMap<Uuid, StoredEntry>>,
    revision: AtomicU64,
}

impl InMemoryVectorStore {
    pub fn new(identity: EmbeddingIdentity) -> Self {
        Self {
            identity,
            entries: RwLock::new(HashMap::new()),
            revision: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored entry, ordered by source then sequence index.
    pub fn entries(&self) -> Vec<IndexEntry> {
        let store = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries: Vec<IndexEntry> = store.values().map(|s| s.entry.clone()).collect();
        entries.sort_by(|a, b| {
            a.chunk
                .source_id
                .cmp(&b.chunk.source_id)
                .then(a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
        });
        entries
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn identity(&self) -> &EmbeddingIdentity {
        &self.identity
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), DomainError> {
        // Validate the whole batch before touching the map.
        for entry in entries {
            self.check_embedding(&entry.embedding)?;
        }

        let mut store = self
            .entries
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        for entry in entries {
            let revision = self.revision.fetch_add(1, Ordering::SeqCst);
            store.insert(
                entry.id(),
                StoredEntry {
                    entry: entry.clone(),
                    revision,
                },
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.check_embedding(query)?;

        let store = self
            .entries
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let mut results: Vec<(SearchResult, u64)> = store
            .values()
            .filter(|s| filter.map_or(true, |f| f.matches(&s.entry.chunk.source_id)))
            .map(|s| {
                let score = query.cosine_similarity(&s.entry.embedding);
                (
                    SearchResult {
                        chunk: s.entry.chunk.clone(),
                        score,
                    },
                    s.revision,
                )
            })
            .collect();

        results.sort_by(|a, b| b.0.score.total_cmp(&a.0.score).then(b.1.cmp(&a.1)));

        Ok(results.into_iter().take(top_k).map(|(r, _)| r).collect())
    }

    async fn delete(&self, selector: &DeleteSelector) -> Result<(), DomainError> {
        let mut store = self
            .entries
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        store.retain(|_, s| !selector.matches(&s.entry.chunk));
        Ok(())
    }
}
