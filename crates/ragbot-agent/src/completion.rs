//! Completion client — one system + user exchange with the chat model.

use std::sync::Arc;

use ragbot_core::error::{FailureReason, RagBotError, Result};
use ragbot_core::traits::{ChatProvider, GenerateParams};
use ragbot_core::types::Message;

/// Sends an assembled prompt to the chat model and returns its answer.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn ChatProvider>,
    model: String,
    system_instruction: String,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_instruction: system_instruction.into(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model to answer `prompt`. The content of the first choice is
    /// returned verbatim; a missing or empty answer is an error.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = [
            Message::system(self.system_instruction.as_str()),
            Message::user(prompt),
        ];
        let params = GenerateParams {
            temperature: self.temperature,
            ..GenerateParams::deterministic(self.model.as_str())
        };

        let response = self.provider.chat(&messages, &params).await?;

        if let Some(usage) = response.usage {
            tracing::debug!(
                "💬 {} answered: {} prompt + {} completion tokens",
                self.provider.name(),
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        match response.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(RagBotError::completion(
                FailureReason::Malformed,
                format!(
                    "empty answer from {} (finish_reason: {})",
                    self.provider.name(),
                    response.finish_reason.as_deref().unwrap_or("none")
                ),
            )),
        }
    }
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}
