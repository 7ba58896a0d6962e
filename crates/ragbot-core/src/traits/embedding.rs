//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into a dense vector.
///
/// Implementations report failures as
/// [`RagBotError::Embedding`](crate::error::RagBotError::Embedding).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;
}
