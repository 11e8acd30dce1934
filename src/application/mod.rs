//! Application layer - use cases and orchestration.
//!
//! Services depend on the domain ports (traits) rather than on concrete
//! backends, so every use case runs unchanged against the in-memory store
//! and test fakes.

mod retry;
pub mod services;

pub use retry::RetryPolicy;
pub use services::{
    AnswerGuard, AnswerPipeline, ContextAssembler, Generator, IngestionService, PipelineSettings,
    Retriever,
};
