use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder,
    PointId, PointStruct, PointsIdsList, Range, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    ports::{DeleteSelector, SearchFilter, VectorStore},
    Chunk, DomainError, Embedding, EmbeddingIdentity, IndexEntry, SearchResult,
};
use crate::infrastructure::config::VectorStoreConfig;

const KIND_CHUNK: &str = "chunk";
const KIND_MANIFEST: &str = "manifest";
/// Qdrant picks arbitrarily among candidates tied at the cut-off score, so
/// searches ask for this many times `top_k` and rank the page locally.
const SEARCH_OVERFETCH: usize = 2;

/// Qdrant-backed index. Each collection carries one manifest point that
/// records the embedding model and dimension the collection was built with;
/// opening a collection with a different embedder fails.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    identity: EmbeddingIdentity,
}

impl QdrantVectorStore {
    fn open(config: &VectorStoreConfig, identity: EmbeddingIdentity) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DomainError::index(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            identity,
        })
    }

    /// Opens the configured collection, creating it with a manifest when it
    /// does not exist yet. An existing collection must have been built by the
    /// same embedding model and dimension.
    pub async fn connect(
        config: &VectorStoreConfig,
        identity: EmbeddingIdentity,
    ) -> Result<Self, DomainError> {
        let store = Self::open(config, identity)?;
        store.ensure_collection().await?;
        Ok(store)
    }

    /// Like [`connect`](Self::connect), but drops any existing collection
    /// first, whatever model built it.
    pub async fn connect_fresh(
        config: &VectorStoreConfig,
        identity: EmbeddingIdentity,
    ) -> Result<Self, DomainError> {
        let store = Self::open(config, identity)?;
        store.reset().await?;
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn collection_exists(&self) -> Result<bool, DomainError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    async fn ensure_collection(&self) -> Result<(), DomainError> {
        if self.collection_exists().await? {
            return self.verify_manifest().await;
        }
        self.create_collection().await
    }

    async fn create_collection(&self) -> Result<(), DomainError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.identity.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        self.write_manifest().await?;

        info!(
            collection = %self.collection,
            model = %self.identity.model,
            dimension = self.identity.dimension,
            "created collection"
        );
        Ok(())
    }

    /// Drops the collection with all its entries and creates it again for the
    /// current embedder. Used when the corpus must be rebuilt under a new model.
    pub async fn reset(&self) -> Result<(), DomainError> {
        if self.collection_exists().await? {
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(|e| DomainError::index(e.to_string()))?;
            warn!(collection = %self.collection, "dropped collection");
        }
        self.create_collection().await
    }

    fn manifest_id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.collection.as_bytes())
    }

    async fn write_manifest(&self) -> Result<(), DomainError> {
        let payload: Payload = serde_json::json!({
            "kind": KIND_MANIFEST,
            "model": self.identity.model,
            "dimension": self.identity.dimension,
            "created_at": Utc::now().to_rfc3339(),
        })
        .try_into()
        .map_err(|_| DomainError::internal("Failed to create manifest payload"))?;

        // Cosine distance needs a non-zero vector; searches exclude this point.
        let mut vector = vec![0.0f32; self.identity.dimension];
        if let Some(first) = vector.first_mut() {
            *first = 1.0;
        }

        let point = PointStruct::new(self.manifest_id().to_string(), vector, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        Ok(())
    }

    async fn verify_manifest(&self) -> Result<(), DomainError> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    &self.collection,
                    vec![PointId::from(self.manifest_id().to_string())],
                )
                .with_payload(true),
            )
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        let recorded = response.result.into_iter().next().and_then(|point| {
            let model = point.payload.get("model")?.as_str()?.to_string();
            let dimension = point.payload.get("dimension")?.as_integer()? as usize;
            Some(EmbeddingIdentity::new(model, dimension))
        });

        match recorded {
            Some(recorded) => {
                recorded.ensure_matches(&self.identity)?;
                debug!(collection = %self.collection, "collection manifest verified");
                Ok(())
            }
            None => Err(DomainError::EmbeddingModelMismatch {
                expected: "<unrecorded>".to_string(),
                actual: self.identity.model.clone(),
            }),
        }
    }

    fn chunk_payload(entry: &IndexEntry) -> Result<Payload, DomainError> {
        serde_json::json!({
            "kind": KIND_CHUNK,
            "chunk_id": entry.chunk.id.to_string(),
            "source_id": entry.chunk.source_id,
            "content": entry.chunk.text,
            "sequence_index": entry.chunk.sequence_index,
            "char_start": entry.chunk.char_start,
            "char_end": entry.chunk.char_end,
            "indexed_at": Utc::now().timestamp_micros(),
        })
        .try_into()
        .map_err(|_| DomainError::internal("Failed to create payload"))
    }

    fn chunk_from_payload(payload: &HashMap<String, QdrantValue>) -> Option<(Chunk, i64)> {
        let id: Uuid = payload.get("chunk_id")?.as_str()?.parse().ok()?;
        let source_id = payload.get("source_id")?.as_str()?.to_string();
        let text = payload.get("content")?.as_str()?.to_string();
        let sequence_index = payload.get("sequence_index")?.as_integer()? as usize;
        let char_start = payload.get("char_start")?.as_integer()? as usize;
        let char_end = payload.get("char_end")?.as_integer()? as usize;
        let indexed_at = payload
            .get("indexed_at")
            .and_then(|v| v.as_integer())
            .unwrap_or_default();

        let chunk = Chunk {
            id,
            source_id,
            text,
            sequence_index,
            char_start,
            char_end,
        };
        Some((chunk, indexed_at))
    }

    fn chunk_filter(source_id: &str, stale_from: Option<usize>) -> Filter {
        let mut conditions = vec![
            Condition::matches("kind", KIND_CHUNK.to_string()),
            Condition::matches("source_id", source_id.to_string()),
        ];
        if let Some(first_stale) = stale_from {
            conditions.push(Condition::range(
                "sequence_index",
                Range {
                    gte: Some(first_stale as f64),
                    ..Default::default()
                },
            ));
        }
        Filter::must(conditions)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn identity(&self) -> &EmbeddingIdentity {
        &self.identity
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), DomainError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(entries.len());
        for entry in entries {
            self.check_embedding(&entry.embedding)?;
            points.push(PointStruct::new(
                entry.id().to_string(),
                entry.embedding.as_slice().to_vec(),
                Self::chunk_payload(entry)?,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        debug!(collection = %self.collection, count = entries.len(), "upserted chunks");
        Ok(())
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.check_embedding(query)?;

        let mut conditions = vec![Condition::matches("kind", KIND_CHUNK.to_string())];
        if let Some(filter) = filter {
            conditions.push(Condition::matches("source_id", filter.source_ids.clone()));
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(
                    &self.collection,
                    query.as_slice().to_vec(),
                    top_k.saturating_mul(SEARCH_OVERFETCH) as u64,
                )
                .filter(Filter::must(conditions))
                .with_payload(true),
            )
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        let scored: Vec<(SearchResult, i64)> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let (chunk, indexed_at) = Self::chunk_from_payload(&point.payload)?;
                Some((
                    SearchResult {
                        chunk,
                        score: point.score,
                    },
                    indexed_at,
                ))
            })
            .collect();

        Ok(rank_by_recency(scored, top_k))
    }

    async fn delete(&self, selector: &DeleteSelector) -> Result<(), DomainError> {
        let builder = DeletePointsBuilder::new(&self.collection).wait(true);
        let builder = match selector {
            DeleteSelector::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(());
                }
                builder.points(PointsIdsList {
                    ids: ids.iter().map(|id| PointId::from(id.to_string())).collect(),
                })
            }
            DeleteSelector::Source(source_id) => builder.points(Self::chunk_filter(source_id, None)),
            DeleteSelector::StaleChunks { source_id, keep } => {
                builder.points(Self::chunk_filter(source_id, Some(*keep)))
            }
        };

        self.client
            .delete_points(builder)
            .await
            .map_err(|e| DomainError::index(e.to_string()))?;

        debug!(collection = %self.collection, ?selector, "deleted points");
        Ok(())
    }
}

/// Best score first, newer `indexed_at` first among equal scores, cut to
/// `top_k`.
fn rank_by_recency(mut scored: Vec<(SearchResult, i64)>, top_k: usize) -> Vec<SearchResult> {
    scored.sort_by(|a, b| b.0.score.total_cmp(&a.0.score).then(b.1.cmp(&a.1)));
    scored.into_iter().take(top_k).map(|(r, _)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(value: serde_json::Value) -> HashMap<String, QdrantValue> {
        let payload: Payload = value.try_into().unwrap();
        payload.into()
    }

    #[test]
    fn test_chunk_payload_round_trip() {
        let entry = IndexEntry::new(
            Chunk::new("bio.md", "Harsha is a software engineer.", 2, 40, 70),
            Embedding::new(vec![0.1, 0.2]),
        );
        let payload = QdrantVectorStore::chunk_payload(&entry).unwrap();
        let map: HashMap<String, QdrantValue> = payload.into();

        let (chunk, indexed_at) = QdrantVectorStore::chunk_from_payload(&map).unwrap();
        assert_eq!(chunk, entry.chunk);
        assert!(indexed_at > 0);
    }

    #[test]
    fn test_manifest_payload_is_not_a_chunk() {
        let map = payload_of(serde_json::json!({
            "kind": KIND_MANIFEST,
            "model": "all-MiniLM-L6-v2",
            "dimension": 384,
        }));
        assert!(QdrantVectorStore::chunk_from_payload(&map).is_none());
    }

    fn scored(text: &str, score: f32, indexed_at: i64) -> (SearchResult, i64) {
        (
            SearchResult {
                chunk: Chunk::new(text, text, 0, 0, text.chars().count()),
                score,
            },
            indexed_at,
        )
    }

    #[test]
    fn test_rank_keeps_newest_of_tied_candidates() {
        let page = vec![
            scored("older", 0.8, 100),
            scored("best", 0.9, 50),
            scored("newer", 0.8, 200),
            scored("weak", 0.2, 300),
        ];

        let ranked = rank_by_recency(page, 2);

        let texts: Vec<&str> = ranked.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["best", "newer"]);
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let page = (0..6).map(|i| scored("same", 0.5, i)).collect();
        assert_eq!(rank_by_recency(page, 3).len(), 3);
    }
}
