pub mod chunking;
pub mod entities;
pub mod errors;
pub mod ports;

pub use chunking::{Chunker, ChunkerConfig, Chunks};
pub use entities::*;
pub use errors::{DomainError, Result};
