use crate::domain::{Answer, RetrievalResult};

pub const DEFAULT_REFUSAL: &str = "I don't know based on the provided context.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Grounded,
    Refused,
}

#[derive(Debug, Clone)]
pub enum GuardDecision {
    Grounded(RetrievalResult),
    Refused,
}

impl GuardDecision {
    pub fn state(&self) -> GuardState {
        match self {
            Self::Grounded(_) => GuardState::Grounded,
            Self::Refused => GuardState::Refused,
        }
    }
}

/// Decides from retrieval alone whether generation may run. The language
/// model never gets a say in this.
#[derive(Debug, Clone)]
pub struct AnswerGuard {
    refusal: String,
}

impl AnswerGuard {
    pub fn new(refusal: impl Into<String>) -> Self {
        Self {
            refusal: refusal.into(),
        }
    }

    pub fn evaluate(&self, retrieval: RetrievalResult) -> GuardDecision {
        if retrieval.is_empty() {
            GuardDecision::Refused
        } else {
            GuardDecision::Grounded(retrieval)
        }
    }

    pub fn refusal_text(&self) -> &str {
        &self.refusal
    }

    pub fn refusal(&self) -> Answer {
        Answer::refused(&self.refusal)
    }
}

impl Default for AnswerGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REFUSAL)
    }
}
