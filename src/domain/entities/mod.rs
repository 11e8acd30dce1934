mod answer;
mod conversation;
mod document;
mod embedding;

pub use answer::Answer;
pub use conversation::{ConversationHistory, ConversationTurn};
pub use document::{Chunk, Document, IndexEntry, RetrievalResult, SearchResult};
pub use embedding::{Embedding, EmbeddingIdentity};
