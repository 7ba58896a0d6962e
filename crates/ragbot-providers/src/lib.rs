//! # RagBot Providers
//!
//! Embedding and chat-completion providers.
//!
//! All supported backends (OpenAI, Mistral, Ollama, llama.cpp, custom
//! endpoints) speak the OpenAI wire format and are handled by a single
//! [`OpenAiCompatibleProvider`].

pub mod openai_compatible;
pub mod provider_registry;

pub use openai_compatible::OpenAiCompatibleProvider;

use ragbot_core::config::LlmConfig;
use ragbot_core::error::{RagBotError, Result};

/// Create the provider named by `llm.provider`.
///
/// Credentials are resolved here, once: a provider that needs a key and has
/// none fails with `ApiKeyMissing`.
pub fn create_provider(llm: &LlmConfig) -> Result<OpenAiCompatibleProvider> {
    create_provider_with_env(llm, |key| std::env::var(key).ok())
}

/// [`create_provider`] reading the environment through `env`.
pub fn create_provider_with_env(
    llm: &LlmConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<OpenAiCompatibleProvider> {
    match llm.provider.as_str() {
        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => OpenAiCompatibleProvider::custom(other, llm),

        name => {
            let registry = provider_registry::get_provider_config(name)
                .ok_or_else(|| RagBotError::ProviderNotFound(name.into()))?;
            OpenAiCompatibleProvider::from_registry_with_env(registry, llm, env)
        }
    }
}
