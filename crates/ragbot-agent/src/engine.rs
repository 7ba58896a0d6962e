//! RAG engine — embed, rank, assemble, complete.
//!
//! Everything a query needs (corpus, providers, models, budget) is bound at
//! construction; [`RagEngine::ask`] only reads shared state, so one engine
//! behind an `Arc` serves any number of concurrent queries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ragbot_core::config::RagBotConfig;
use ragbot_core::error::{RagBotError, Result};
use ragbot_core::traits::{ChatProvider, EmbeddingProvider};
use ragbot_knowledge::{
    AssembledPrompt, Corpus, DEFAULT_TOP_N, PromptTemplate, TokenAccountant, TokenCounter,
    assemble, rank_by_cosine,
};

use crate::completion::CompletionClient;

/// Room left for the answer in a 4096-token context window.
pub const DEFAULT_TOKEN_BUDGET: i64 = 4096 - 500;

pub struct RagEngine {
    corpus: Arc<Corpus>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: CompletionClient,
    tokens: Arc<dyn TokenCounter>,
    template: PromptTemplate,
    embedding_model: String,
    top_n: usize,
    token_budget: i64,
}

impl RagEngine {
    /// Engine with default retrieval settings; adjust with the `with_*` methods.
    pub fn new(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: CompletionClient,
        tokens: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            corpus,
            embedder,
            completion,
            tokens,
            template: PromptTemplate::for_topic("37th Academy Awards"),
            embedding_model: "text-embedding-ada-002".into(),
            top_n: DEFAULT_TOP_N,
            token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }

    /// Wire an engine from validated configuration.
    ///
    /// Fails with `UnknownModel` when the chat model has no tokenizer.
    pub fn from_config(
        config: &RagBotConfig,
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let tokens = TokenAccountant::for_model(&config.llm.chat_model)?;
        let completion = CompletionClient::new(
            chat,
            config.llm.chat_model.as_str(),
            config.identity.system_prompt.as_str(),
        )
        .with_temperature(config.llm.temperature);

        let template = PromptTemplate::for_topic(&config.knowledge.topic)
            .with_section_label(config.knowledge.section_label.as_str());

        tracing::info!(
            "🧠 RAG engine ready: {} passages, chat model {} ({}), top_n {}, budget {}",
            corpus.len(),
            config.llm.chat_model,
            tokens.encoding_name(),
            config.knowledge.top_n,
            config.knowledge.token_budget
        );

        Ok(Self::new(corpus, embedder, completion, Arc::new(tokens))
            .with_template(template)
            .with_embedding_model(config.llm.embedding_model.as_str())
            .with_top_n(config.knowledge.top_n)
            .with_token_budget(config.knowledge.token_budget))
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_token_budget(mut self, token_budget: i64) -> Self {
        self.token_budget = token_budget;
        self
    }

    pub fn token_budget(&self) -> i64 {
        self.token_budget
    }

    pub fn chat_model(&self) -> &str {
        self.completion.model()
    }

    /// Retrieval and assembly only: the prompt [`ask`](Self::ask) would send.
    pub async fn prepare(&self, query: &str) -> Result<AssembledPrompt> {
        self.prepare_with_budget(query, self.token_budget).await
    }

    async fn prepare_with_budget(&self, query: &str, token_budget: i64) -> Result<AssembledPrompt> {
        let query_embedding = self.embedder.embed(query, &self.embedding_model).await?;
        let ranked = rank_by_cosine(&query_embedding, &self.corpus, self.top_n)?;
        Ok(assemble(
            &self.template,
            query,
            ranked.iter().map(|r| r.text),
            self.tokens.as_ref(),
            token_budget,
        ))
    }

    /// Answer `query` from the corpus with the configured budget.
    pub async fn ask(&self, query: &str) -> Result<String> {
        self.ask_with_budget(query, self.token_budget).await
    }

    /// Answer `query`, packing passages into at most `token_budget` tokens.
    pub async fn ask_with_budget(&self, query: &str, token_budget: i64) -> Result<String> {
        let started = Instant::now();
        let prompt = self.prepare_with_budget(query, token_budget).await?;
        let answer = self.answer(&prompt).await?;

        tracing::debug!(
            "✅ Answered in {:?}: {} passages, {} prompt tokens",
            started.elapsed(),
            prompt.passages,
            prompt.tokens
        );
        Ok(answer)
    }

    async fn answer(&self, prompt: &AssembledPrompt) -> Result<String> {
        self.completion.complete(&prompt.text).await
    }

    /// [`ask`](Self::ask) bounded by `deadline`. The in-flight request is
    /// dropped when the deadline passes.
    pub async fn ask_with_deadline(&self, query: &str, deadline: Duration) -> Result<String> {
        tokio::time::timeout(deadline, self.ask(query))
            .await
            .map_err(|_| RagBotError::DeadlineExceeded(deadline))?
    }

    /// [`ask_with_deadline`](Self::ask_with_deadline) that hands the assembled
    /// prompt to `inspect` before the chat model is called. The deadline
    /// covers embedding, assembly and completion.
    pub async fn ask_with_deadline_inspect(
        &self,
        query: &str,
        deadline: Duration,
        inspect: impl FnOnce(&AssembledPrompt),
    ) -> Result<String> {
        let pipeline = async {
            let prompt = self.prepare(query).await?;
            inspect(&prompt);
            self.answer(&prompt).await
        };
        tokio::time::timeout(deadline, pipeline)
            .await
            .map_err(|_| RagBotError::DeadlineExceeded(deadline))?
    }
}
