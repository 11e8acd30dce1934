use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Per-session memory: a sliding window of the most recent turns.
///
/// Owned by a single session and never shared. Recording a turn past
/// `max_turns` evicts the oldest one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    pub fn record(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn::new(question, answer));
    }

    /// Turns in chronological order, oldest first.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(5)
    }
}
