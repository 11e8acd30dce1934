pub mod bootstrap;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod llm;
pub mod vector_store;

pub use bootstrap::{build_ingestion_with, build_pipeline, build_pipeline_with, PipelineHandle};
pub use config::{AppConfig, Config, PromptsConfig};
pub use corpus::load_corpus;
pub use embedding::TextEmbedding;
pub use llm::GroqLlm;
pub use vector_store::{InMemoryVectorStore, QdrantVectorStore};
