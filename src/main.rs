use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grounded_rag::domain::ports::EmbeddingService;
use grounded_rag::infrastructure::{
    build_ingestion_with, load_corpus, AppConfig, QdrantVectorStore, TextEmbedding,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grounded_rag=info,rag_ingest=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("RAG_LOG_JSON").is_ok_and(|v| v == "1") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    let vector_config = &config.config.vector_store;
    let ingest_config = &config.config.ingest;
    let retry = config.config.retry.policy();

    let embedding = Arc::new(TextEmbedding::from_config(&config.config.embedding)?);
    let identity = embedding.identity();

    let store = if ingest_config.rebuild {
        warn!(collection = %vector_config.collection, "rebuilding collection from scratch");
        retry
            .run("open index", || {
                QdrantVectorStore::connect_fresh(vector_config, identity.clone())
            })
            .await?
    } else {
        retry
            .run("open index", || QdrantVectorStore::connect(vector_config, identity.clone()))
            .await?
    };
    info!(
        collection = %store.collection(),
        model = %identity.model,
        dimension = identity.dimension,
        "index ready"
    );

    let ingestion = build_ingestion_with(&config, embedding, Arc::new(store))?;
    let documents = load_corpus(&ingest_config.corpus_dir, &ingest_config.extensions).await?;
    if documents.is_empty() {
        warn!(corpus_dir = %ingest_config.corpus_dir.display(), "no documents to ingest");
        return Ok(());
    }

    let started = Instant::now();
    let summary = ingestion.ingest_all(&documents).await;

    for (source_id, e) in &summary.failures {
        error!(%source_id, error = %e, "document was not ingested");
    }
    info!(
        documents = summary.reports.len(),
        failed = summary.failures.len(),
        chunk_count = summary.chunk_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingestion finished"
    );

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} documents failed to ingest",
            summary.failures.len(),
            documents.len()
        );
    }
    Ok(())
}
