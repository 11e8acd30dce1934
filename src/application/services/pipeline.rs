use tracing::{info, instrument, warn};

use super::{AnswerGuard, ContextAssembler, GuardDecision, Generator, Retriever};
use crate::domain::{Answer, ConversationHistory, ConversationTurn, DomainError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub min_score: f32,
    /// Most recent turns passed to the generator.
    pub history_turns: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
            history_turns: 5,
        }
    }
}

/// Question in, grounded answer or refusal out.
///
/// Dropping the future returned by [`AnswerPipeline::answer`] between stages
/// abandons the request; nothing is written anywhere on the query path.
pub struct AnswerPipeline {
    retriever: Retriever,
    guard: AnswerGuard,
    assembler: ContextAssembler,
    generator: Generator,
    settings: PipelineSettings,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        guard: AnswerGuard,
        assembler: ContextAssembler,
        generator: Generator,
        settings: PipelineSettings,
    ) -> Result<Self, DomainError> {
        if settings.top_k == 0 {
            return Err(DomainError::invalid_config("top_k must be greater than zero"));
        }
        if !settings.min_score.is_finite() {
            return Err(DomainError::invalid_config("min_score must be a finite number"));
        }
        Ok(Self {
            retriever,
            guard,
            assembler,
            generator,
            settings,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[instrument(skip(self, question, history), fields(history_len = history.len()))]
    pub async fn answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, DomainError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DomainError::validation("question must not be empty"));
        }

        let retrieval = self
            .retriever
            .retrieve(question, self.settings.top_k, self.settings.min_score)
            .await?;

        let retrieval = match self.guard.evaluate(retrieval) {
            GuardDecision::Grounded(retrieval) => retrieval,
            GuardDecision::Refused => {
                info!(grounded = false, "no passage met the relevance threshold");
                return Ok(self.guard.refusal());
            }
        };

        let context = self.assembler.assemble(retrieval.iter());
        if context.is_empty() {
            warn!(
                result_count = retrieval.len(),
                max_chars = self.assembler.max_chars(),
                "no retrieved passage fits the context budget"
            );
            return Ok(self.guard.refusal());
        }

        let recent = &history[history.len().saturating_sub(self.settings.history_turns)..];
        let text = self.generator.generate(question, &context.text, recent).await?;

        info!(
            grounded = true,
            result_count = retrieval.len(),
            source_count = context.sources.len(),
            "answer generated"
        );
        Ok(Answer::grounded(text, context.sources))
    }

    /// Answers and records the turn in `history`. Refusals are recorded too;
    /// errors leave the history untouched.
    pub async fn answer_in_session(
        &self,
        question: &str,
        history: &mut ConversationHistory,
    ) -> Result<Answer, DomainError> {
        let answer = self.answer(question, &history.turns()).await?;
        history.record(question.trim(), answer.text.clone());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::RetryPolicy;
    use crate::domain::{
        ports::{EmbeddingService, LlmService, VectorStore},
        Chunk, Embedding, EmbeddingIdentity, IndexEntry,
    };
    use crate::infrastructure::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct AxisEmbedding;

    #[async_trait]
    impl EmbeddingService for AxisEmbedding {
        async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
            Ok(if text.contains("engineer") || text.contains("Harsha") {
                Embedding::new(vec![1.0, 0.0])
            } else {
                Embedding::new(vec![0.0, 1.0])
            })
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn identity(&self) -> EmbeddingIdentity {
            EmbeddingIdentity::new("axis", 2)
        }
    }

    #[derive(Default)]
    struct RecordingLlm {
        calls: AtomicUsize,
        last_prompt: Mutex<String>,
    }

    #[async_trait]
    impl LlmService for RecordingLlm {
        async fn complete_with_system(
            &self,
            _system: &str,
            prompt: &str,
        ) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            Ok("Harsha is a software engineer.".to_string())
        }
    }

    async fn pipeline(llm: Arc<RecordingLlm>, max_chars: usize) -> AnswerPipeline {
        let store = Arc::new(InMemoryVectorStore::new(EmbeddingIdentity::new("axis", 2)));
        store
            .upsert(&[IndexEntry::new(
                Chunk::new("bio.md", "Harsha is a software engineer.", 0, 0, 30),
                Embedding::new(vec![1.0, 0.0]),
            )])
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(AxisEmbedding), store)
            .unwrap()
            .with_retry(RetryPolicy::none());
        let generator = Generator::new(llm).with_retry(RetryPolicy::none());

        AnswerPipeline::new(
            retriever,
            AnswerGuard::new("I don't know."),
            ContextAssembler::new(max_chars),
            generator,
            PipelineSettings {
                top_k: 3,
                min_score: 0.5,
                history_turns: 1,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_grounded_answer_lists_sources() {
        let llm = Arc::new(RecordingLlm::default());
        let answer = pipeline(llm.clone(), 1000)
            .await
            .answer("Who is Harsha?", &[])
            .await
            .unwrap();

        assert!(answer.grounded);
        assert_eq!(answer.sources, vec!["bio.md"]);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_irrelevant_question_is_refused_without_generation() {
        let llm = Arc::new(RecordingLlm::default());
        let answer = pipeline(llm.clone(), 1000)
            .await
            .answer("What is the capital of France?", &[])
            .await
            .unwrap();

        assert_eq!(answer, Answer::refused("I don't know."));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let llm = Arc::new(RecordingLlm::default());
        let result = pipeline(llm.clone(), 1000).await.answer("   ", &[]).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_budget_too_small_refuses() {
        let llm = Arc::new(RecordingLlm::default());
        let answer = pipeline(llm.clone(), 10)
            .await
            .answer("Who is Harsha?", &[])
            .await
            .unwrap();

        assert!(!answer.grounded);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_session_history_is_windowed_and_recorded() {
        let llm = Arc::new(RecordingLlm::default());
        let pipeline = pipeline(llm.clone(), 1000).await;
        let mut history = ConversationHistory::new(3);
        history.record("First question about Harsha?", "first answer");
        history.record("Second question about Harsha?", "second answer");

        pipeline
            .answer_in_session("Is Harsha an engineer?", &mut history)
            .await
            .unwrap();

        let prompt = llm.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Second question"));
        assert!(!prompt.contains("First question"));
        assert_eq!(history.len(), 3);
        assert_eq!(history.turns()[2].question, "Is Harsha an engineer?");
    }
}
