use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use crate::application::services::IngestionSettings;
use crate::application::{
    AnswerGuard, AnswerPipeline, ContextAssembler, Generator, IngestionService, PipelineSettings,
    Retriever,
};
use crate::domain::{
    ports::{EmbeddingService, LlmService, VectorStore},
    Answer, Chunker, ConversationTurn, DomainError,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::{GroqLlm, QdrantVectorStore, TextEmbedding};

type PipelineFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<AnswerPipeline, DomainError>> + Send + Sync>;

/// Process-wide pipeline that is built on first use and then shared.
///
/// A failed build leaves the handle empty so the next call tries again; a
/// successful one is never replaced.
pub struct PipelineHandle {
    pipeline: OnceCell<AnswerPipeline>,
    factory: PipelineFactory,
}

impl PipelineHandle {
    /// Connects the configured embedding, index and generation backends on
    /// first use.
    pub fn from_config(config: AppConfig) -> Self {
        let config = Arc::new(config);
        Self::with_factory(move || {
            let config = Arc::clone(&config);
            async move { build_pipeline(&config).await }
        })
    }

    pub fn with_factory<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AnswerPipeline, DomainError>> + Send + 'static,
    {
        Self {
            pipeline: OnceCell::new(),
            factory: Box::new(move || factory().boxed()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.initialized()
    }

    pub async fn get(&self) -> Result<&AnswerPipeline, DomainError> {
        self.pipeline.get_or_try_init(|| (self.factory)()).await
    }

    /// Builds the pipeline now instead of on the first question.
    pub async fn warm(&self) -> Result<(), DomainError> {
        self.get().await.map(|_| ())
    }

    pub async fn answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, DomainError> {
        self.get().await?.answer(question, history).await
    }
}

#[instrument(skip_all, fields(collection = %config.config.vector_store.collection))]
pub async fn build_pipeline(config: &AppConfig) -> Result<AnswerPipeline, DomainError> {
    config.validate()?;
    let retry = config.config.retry.policy();

    let embedding = Arc::new(TextEmbedding::from_config(&config.config.embedding)?);
    let identity = embedding.identity();
    let store = retry
        .run("open index", || {
            QdrantVectorStore::connect(&config.config.vector_store, identity.clone())
        })
        .await?;
    let llm = Arc::new(GroqLlm::from_config(&config.config.llm)?);

    info!(
        embedding_model = %identity.model,
        llm_model = %llm.model(),
        "pipeline backends connected"
    );
    build_pipeline_with(config, embedding, Arc::new(store), llm)
}

/// Wires the query path around already-constructed backends.
pub fn build_pipeline_with(
    config: &AppConfig,
    embedding: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmService>,
) -> Result<AnswerPipeline, DomainError> {
    config.validate()?;
    let rag = &config.config.rag;
    let retry = config.config.retry.policy();

    let retriever = Retriever::new(embedding, store)?.with_retry(retry);
    let generator = Generator::new(llm)
        .with_prompts(
            &config.prompts.generator.system,
            &config.prompts.generator.template,
        )?
        .with_retry(retry);

    AnswerPipeline::new(
        retriever,
        AnswerGuard::new(&rag.refusal_message),
        ContextAssembler::new(rag.max_context_chars),
        generator,
        PipelineSettings {
            top_k: rag.top_k,
            min_score: rag.min_score,
            history_turns: rag.history_turns,
        },
    )
}

/// Wires the ingestion path around already-constructed backends.
pub fn build_ingestion_with(
    config: &AppConfig,
    embedding: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
) -> Result<IngestionService, DomainError> {
    config.validate()?;
    let ingest = &config.config.ingest;

    let chunker = Chunker::new(config.config.rag.chunker())?;
    let settings = IngestionSettings {
        embed_batch_size: ingest.embed_batch_size,
        embed_concurrency: ingest.embed_concurrency,
        upsert_batch_size: ingest.upsert_batch_size,
    };

    Ok(IngestionService::new(chunker, embedding, store)?
        .with_settings(settings)?
        .with_retry(config.config.retry.policy()))
}
