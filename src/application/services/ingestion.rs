use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::application::RetryPolicy;
use crate::domain::{
    ports::{DeleteSelector, EmbeddingService, VectorStore},
    Chunk, Chunker, Document, DomainError, Embedding, IndexEntry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSettings {
    /// Chunks per embedding request.
    pub embed_batch_size: usize,
    /// Embedding requests in flight at once.
    pub embed_concurrency: usize,
    /// Entries per upsert call.
    pub upsert_batch_size: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            embed_batch_size: 32,
            embed_concurrency: 4,
            upsert_batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source_id: String,
    pub chunk_count: usize,
    pub embed_batches: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub reports: Vec<IngestReport>,
    pub failures: Vec<(String, DomainError)>,
}

impl IngestSummary {
    pub fn chunk_count(&self) -> usize {
        self.reports.iter().map(|r| r.chunk_count).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Turns documents into index entries: chunk, embed, upsert, then drop the
/// chunks a longer previous version left behind.
pub struct IngestionService {
    chunker: Chunker,
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    settings: IngestionSettings,
    retry: RetryPolicy,
}

impl IngestionService {
    pub fn new(
        chunker: Chunker,
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self, DomainError> {
        vector_store.identity().ensure_matches(&embedding.identity())?;
        Ok(Self {
            chunker,
            embedding,
            vector_store,
            settings: IngestionSettings::default(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_settings(mut self, settings: IngestionSettings) -> Result<Self, DomainError> {
        if settings.embed_batch_size == 0
            || settings.embed_concurrency == 0
            || settings.upsert_batch_size == 0
        {
            return Err(DomainError::invalid_config(
                "ingest batch sizes and concurrency must be greater than zero",
            ));
        }
        self.settings = settings;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces every indexed chunk of `document` with its current chunking.
    ///
    /// New entries are written before stale ones are removed, so the document
    /// stays searchable throughout. Chunk ids are derived from
    /// `(source_id, sequence_index)`, which makes a repeated ingest of the same
    /// content a no-op on the index.
    #[instrument(skip(self, document), fields(source_id = %document.id))]
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport, DomainError> {
        if document.id.trim().is_empty() {
            return Err(DomainError::validation("document id must not be empty"));
        }

        let started = Instant::now();
        let chunks: Vec<Chunk> = self.chunker.chunks(document).collect();
        let chunk_count = chunks.len();

        let (embeddings, embed_batches) = self.embed_chunks(&chunks).await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::new(chunk, embedding))
            .collect();

        for batch in entries.chunks(self.settings.upsert_batch_size) {
            self.retry
                .run("upsert chunks", || self.vector_store.upsert(batch))
                .await?;
        }

        let stale = DeleteSelector::StaleChunks {
            source_id: document.id.clone(),
            keep: chunk_count,
        };
        self.retry
            .run("delete stale chunks", || self.vector_store.delete(&stale))
            .await?;

        let report = IngestReport {
            source_id: document.id.clone(),
            chunk_count,
            embed_batches,
            elapsed: started.elapsed(),
        };
        info!(
            chunk_count,
            embed_batches,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "document ingested"
        );
        Ok(report)
    }

    /// Ingests each document in turn. A failing document is recorded and
    /// skipped; entries already committed for other documents stay in place.
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub async fn ingest_all(&self, documents: &[Document]) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for document in documents {
            match self.ingest(document).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    warn!(source_id = %document.id, error = %e, "document ingestion failed");
                    summary.failures.push((document.id.clone(), e));
                }
            }
        }
        summary
    }

    #[instrument(skip(self))]
    pub async fn remove_document(&self, source_id: &str) -> Result<(), DomainError> {
        let selector = DeleteSelector::Source(source_id.to_string());
        self.retry
            .run("delete document", || self.vector_store.delete(&selector))
            .await?;
        info!("document removed from index");
        Ok(())
    }

    /// Embeds chunk batches concurrently; results come back in chunk order.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<(Vec<Embedding>, usize), DomainError> {
        let batches: Vec<&[Chunk]> = chunks.chunks(self.settings.embed_batch_size).collect();
        let batch_count = batches.len();

        let embedded: Vec<Vec<Embedding>> = stream::iter(batches)
            .map(|batch| async move {
                let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
                let vectors = self
                    .retry
                    .run("embed chunks", || self.embedding.embed_batch(&texts))
                    .await?;
                if vectors.len() != batch.len() {
                    return Err(DomainError::embedding(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    )));
                }
                Ok::<_, DomainError>(vectors)
            })
            .boxed()
            .buffered(self.settings.embed_concurrency)
            .try_collect()
            .await?;

        Ok((embedded.into_iter().flatten().collect(), batch_count))
    }
}
