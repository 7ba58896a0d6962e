//! Token accounting with the model's own tokenizer.
//!
//! Budgets are enforced in the tokens the chat model will actually see, so the
//! counter must use that model's BPE. Unknown models are an error: falling back
//! to a different encoding would silently skew every budget decision.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tiktoken_rs::tokenizer::{Tokenizer, get_tokenizer};

use ragbot_core::error::{RagBotError, Result};

/// Deterministic, side-effect free token counting for one model.
pub trait TokenCounter: Send + Sync {
    fn model(&self) -> &str;

    fn count_tokens(&self, text: &str) -> usize;
}

/// tiktoken-backed counter. Cheap to clone; the BPE tables are shared.
#[derive(Clone)]
pub struct TokenAccountant {
    model: String,
    tokenizer: Tokenizer,
    bpe: Arc<CoreBPE>,
}

impl TokenAccountant {
    /// Resolve the tokenizer for `model` and build its BPE tables.
    pub fn for_model(model: &str) -> Result<Self> {
        let tokenizer =
            get_tokenizer(model).ok_or_else(|| RagBotError::UnknownModel(model.to_string()))?;
        let bpe = tiktoken_rs::get_bpe_from_tokenizer(tokenizer).map_err(|e| {
            RagBotError::Other(format!("failed to build {tokenizer:?} tokenizer: {e}"))
        })?;
        tracing::debug!("🔤 Tokenizer for '{}': {:?}", model, tokenizer);
        Ok(Self {
            model: model.to_string(),
            tokenizer,
            bpe: Arc::new(bpe),
        })
    }

    /// Name of the encoding in use, e.g. `Cl100kBase`.
    pub fn encoding_name(&self) -> String {
        format!("{:?}", self.tokenizer)
    }
}

impl TokenCounter for TokenAccountant {
    fn model(&self) -> &str {
        &self.model
    }

    fn count_tokens(&self, text: &str) -> usize {
        // Special-token markers in passages are plain text here.
        self.bpe.encode_ordinary(text).len()
    }
}

impl fmt::Debug for TokenAccountant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAccountant")
            .field("model", &self.model)
            .field("tokenizer", &self.tokenizer)
            .finish()
    }
}

/// One-off count. Builds the tokenizer on every call; hold a
/// [`TokenAccountant`] for repeated use.
pub fn count_tokens(text: &str, model: &str) -> Result<usize> {
    Ok(TokenAccountant::for_model(model)?.count_tokens(text))
}
