#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use grounded_rag::domain::ports::{EmbeddingService, LlmService};
use grounded_rag::domain::{DomainError, Embedding, EmbeddingIdentity};
use grounded_rag::infrastructure::{AppConfig, InMemoryVectorStore};

pub const KEYWORD_DIMENSION: usize = 256;

/// Bag-of-words embedder: every distinct lowercase word gets its own axis the
/// first time it is seen, so there are no hash collisions and cosine
/// similarity is the overlap of word sets.
pub struct KeywordEmbedder {
    vocabulary: Mutex<HashMap<String, usize>>,
    failing_marker: Option<String>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            vocabulary: Mutex::new(HashMap::new()),
            failing_marker: None,
        }
    }

    /// Any batch containing `marker` fails with a backend error.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            vocabulary: Mutex::new(HashMap::new()),
            failing_marker: Some(marker.to_string()),
        }
    }

    fn vectorize(&self, text: &str) -> Result<Embedding, DomainError> {
        let words: BTreeSet<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0f32; KEYWORD_DIMENSION];
        for word in words {
            let next = vocabulary.len();
            let axis = *vocabulary.entry(word).or_insert(next);
            if axis >= KEYWORD_DIMENSION {
                return Err(DomainError::internal("keyword vocabulary exhausted"));
            }
            vector[axis] = 1.0;
        }
        Ok(Embedding::new(vector))
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.vectorize(text)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if let Some(marker) = &self.failing_marker {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(DomainError::embedding("embedding backend unavailable"));
            }
        }
        texts.iter().map(|t| self.vectorize(t)).collect()
    }

    fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity::new("keyword", KEYWORD_DIMENSION)
    }
}

/// Language model fake that counts calls and remembers the last prompt.
pub struct CountingLlm {
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    reply: String,
}

impl CountingLlm {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            reply: reply.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for CountingLlm {
    async fn complete_with_system(&self, _system: &str, prompt: &str) -> Result<String, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub fn keyword_store() -> Arc<InMemoryVectorStore> {
    Arc::new(InMemoryVectorStore::new(EmbeddingIdentity::new(
        "keyword",
        KEYWORD_DIMENSION,
    )))
}

/// Defaults with a single attempt per backend call, so failures surface
/// without backoff delays.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.config.retry.max_attempts = 1;
    config
}
