//! RagBot configuration system.
//!
//! One TOML file, every field defaulted, validated once at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagBotError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagBotConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl RagBotConfig {
    /// Load config from the default path (~/.ragbot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagBotError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagBotError::Config(format!("Failed to parse config: {e}")))?;
        tracing::debug!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Write config as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RagBotError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the RagBot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragbot")
    }

    /// Fill model names, corpus path and bot token from the process environment.
    ///
    /// Only non-empty variables override the file. Provider API keys are not
    /// copied here: each provider reads its own variables when it is created.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// [`apply_env_overrides`](Self::apply_env_overrides) reading variables through `lookup`.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get("GPT_MODEL") {
            self.llm.chat_model = model;
        }
        if let Some(path) = get("RAGBOT_CORPUS") {
            self.knowledge.corpus_path = path;
        }
        if let Some(token) = get("BOT_TOKEN") {
            let telegram = self
                .channel
                .telegram
                .get_or_insert_with(TelegramChannelConfig::default);
            telegram.bot_token = token;
            telegram.enabled = true;
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.llm.chat_model.trim().is_empty() {
            return Err(RagBotError::Config("llm.chat_model is required".into()));
        }
        if self.llm.embedding_model.trim().is_empty() {
            return Err(RagBotError::Config("llm.embedding_model is required".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(RagBotError::Config(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }
        if self.knowledge.corpus_path.trim().is_empty() {
            return Err(RagBotError::Config("knowledge.corpus_path is required".into()));
        }
        if self.knowledge.top_n == 0 {
            return Err(RagBotError::Config("knowledge.top_n must be at least 1".into()));
        }
        if let Some(telegram) = &self.channel.telegram
            && telegram.enabled
            && telegram.bot_token.trim().is_empty()
        {
            return Err(RagBotError::Config(
                "channel.telegram.bot_token is required when telegram is enabled".into(),
            ));
        }
        if self.bot.max_concurrent_queries == 0 {
            return Err(RagBotError::Config(
                "bot.max_concurrent_queries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// LLM endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Registry name ("openai", "mistral", "ollama", ...) or "custom:<url>".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Overrides the registry base URL when non-empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String { "openai".into() }
fn default_chat_model() -> String { "gpt-3.5-turbo".into() }
fn default_embedding_model() -> String { "text-embedding-ada-002".into() }
fn default_request_timeout() -> u64 { 60 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: String::new(),
            api_key: String::new(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: 0.0,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Knowledge base and prompt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// CSV with `text` and `embedding` columns.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,
    /// What the passages are about; used in the prompt preamble.
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_section_label")]
    pub section_label: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Maximum prompt tokens sent to the model.
    #[serde(default = "default_token_budget")]
    pub token_budget: i64,
}

fn default_corpus_path() -> String { "37th Academy Awards.csv".into() }
fn default_topic() -> String { "37th Academy Awards".into() }
fn default_section_label() -> String { "Wikipedia article section".into() }
fn default_top_n() -> usize { 100 }
fn default_token_budget() -> i64 { 4096 - 500 }

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            topic: default_topic(),
            section_label: default_section_label(),
            top_n: default_top_n(),
            token_budget: default_token_budget(),
        }
    }
}

/// Persona sent as the system message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_system_prompt() -> String {
    "You answer questions about the 37th Academy Awards.".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

/// Bot front-end texts and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_start_text")]
    pub start_text: String,
    #[serde(default = "default_help_text")]
    pub help_text: String,
    #[serde(default = "default_failure_text")]
    pub failure_text: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_queries: usize,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_start_text() -> String { "Ask the bot a question.".into() }
fn default_help_text() -> String {
    "This bot answers questions about the 37th Academy Awards.".into()
}
fn default_failure_text() -> String {
    "Sorry, I could not answer that right now. Please try again later.".into()
}
fn default_max_concurrent() -> usize { 4 }
fn default_query_timeout() -> u64 { 120 }

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            start_text: default_start_text(),
            help_text: default_help_text(),
            failure_text: default_failure_text(),
            max_concurrent_queries: default_max_concurrent(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub telegram: Option<TelegramChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Empty means every chat is served.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn bool_true() -> bool { true }
fn default_poll_interval() -> u64 { 1 }

impl Default for TelegramChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            allowed_chat_ids: vec![],
            poll_interval: default_poll_interval(),
        }
    }
}
