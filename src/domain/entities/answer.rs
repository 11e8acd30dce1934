use serde::{Deserialize, Serialize};

/// What `answer()` hands back to its caller.
///
/// `grounded == false` means the refusal text was returned without the
/// language model being consulted. Backend failures are reported as errors,
/// never as an `Answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub grounded: bool,
}

impl Answer {
    pub fn grounded(text: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            text: text.into(),
            sources,
            grounded: true,
        }
    }

    pub fn refused(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
            grounded: false,
        }
    }
}
