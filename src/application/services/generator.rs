use std::sync::Arc;
use tracing::{debug, instrument};

use crate::application::RetryPolicy;
use crate::domain::{ports::LlmService, ConversationTurn, DomainError};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You're an AI assistant that answers strictly based on the context.";

pub const DEFAULT_TEMPLATE: &str = "CONTEXT:\n{context}\n{history}\nQUESTION:\n{question}\n\n\
Answer only from the context. If it does not contain the answer, say you don't know.";

/// Prompts the language model with retrieved context. Whether generation
/// should happen at all is decided before this is called.
pub struct Generator {
    llm: Arc<dyn LlmService>,
    system_prompt: String,
    template: String,
    retry: RetryPolicy,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        template: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(DomainError::invalid_config(format!(
                    "prompt template must contain {placeholder}"
                )));
            }
        }
        self.system_prompt = system_prompt.into();
        self.template = template;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(skip_all, fields(history_turns = history.len()))]
    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<String, DomainError> {
        let prompt = self.render(question, context, history);
        debug!(prompt_chars = prompt.chars().count(), "prompt rendered");

        let completion = self
            .retry
            .run("generate answer", || {
                self.llm.complete_with_system(&self.system_prompt, &prompt)
            })
            .await?;

        let text = completion.trim();
        if text.is_empty() {
            return Err(DomainError::generation("model returned an empty completion"));
        }
        Ok(text.to_string())
    }

    /// Substitutes placeholders in one left-to-right pass, so braces inside
    /// the question or the context are never expanded a second time.
    pub fn render(&self, question: &str, context: &str, history: &[ConversationTurn]) -> String {
        let history = render_history(history);
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            let (value, len) = if tail.starts_with("{context}") {
                (context, "{context}".len())
            } else if tail.starts_with("{question}") {
                (question, "{question}".len())
            } else if tail.starts_with("{history}") {
                (history.as_str(), "{history}".len())
            } else {
                ("{", 1)
            };
            out.push_str(value);
            rest = &tail[len..];
        }
        out.push_str(rest);
        out
    }
}

fn render_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let turns: Vec<String> = history
        .iter()
        .map(|t| format!("User: {}\nAssistant: {}", t.question, t.answer))
        .collect();
    format!("\nCONVERSATION SO FAR:\n{}\n", turns.join("\n"))
}
