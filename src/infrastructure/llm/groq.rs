use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::groq;
use std::time::Duration;
use tracing::instrument;

use crate::domain::{ports::LlmService, DomainError};
use crate::infrastructure::config::LlmConfig;

const API_KEY_ENV: &str = "GROQ_API_KEY";

pub struct GroqLlm {
    client: groq::Client,
    model: String,
    temperature: f64,
    max_tokens: u64,
    timeout: Duration,
}

impl GroqLlm {
    pub fn from_config(config: &LlmConfig) -> Result<Self, DomainError> {
        if std::env::var(API_KEY_ENV).map_or(true, |key| key.is_empty()) {
            return Err(DomainError::invalid_config(format!("{API_KEY_ENV} is not set")));
        }

        Ok(Self {
            client: groq::Client::from_env(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn prompt(&self, system: &str, prompt: &str) -> Result<String, DomainError> {
        let agent = self
            .client
            .agent(&self.model)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .preamble(system)
            .build();

        tokio::time::timeout(self.timeout, agent.prompt(prompt))
            .await
            .map_err(|_| DomainError::generation(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| DomainError::generation(e.to_string()))
    }
}

#[async_trait]
impl LlmService for GroqLlm {
    #[instrument(skip(self, system, prompt), fields(model = %self.model))]
    async fn complete_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, DomainError> {
        self.prompt(system, prompt).await
    }
}
