//! Chat completion provider trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatResponse, Message};

/// Sampling parameters for one chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerateParams {
    /// Deterministic-leaning parameters (temperature 0).
    pub fn deterministic(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// A chat-completion endpoint.
///
/// Implementations report transport and payload problems as
/// [`RagBotError::Completion`](crate::error::RagBotError::Completion).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ChatResponse>;
}
