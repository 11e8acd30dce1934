mod context;
mod generator;
mod guard;
mod ingestion;
mod pipeline;
mod retriever;

pub use context::{AssembledContext, ContextAssembler};
pub use generator::{Generator, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPLATE};
pub use guard::{AnswerGuard, GuardDecision, GuardState, DEFAULT_REFUSAL};
pub use ingestion::{IngestReport, IngestSummary, IngestionService, IngestionSettings};
pub use pipeline::{AnswerPipeline, PipelineSettings};
pub use retriever::Retriever;
