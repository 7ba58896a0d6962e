//! # RagBot Knowledge
//!
//! Retrieval and prompt assembly over a static, pre-embedded corpus.
//!
//! ## How it works
//! ```text
//! User: "Who won Best Actress?"
//!   ↓ embedding provider
//! query vector
//!   ↓ ranker::rank (cosine, every passage, stable sort)
//! top-N passages
//!   ↓ prompt::assemble (greedy, tiktoken budget)
//! prompt sent to the chat model
//! ```
//!
//! Nothing here performs I/O after startup: the corpus is loaded once and
//! ranking / assembly are pure CPU work.

pub mod corpus;
pub mod prompt;
pub mod ranker;
pub mod tokens;

pub use corpus::{Corpus, CorpusEntry};
pub use prompt::{AssembledPrompt, PromptTemplate, assemble};
pub use ranker::{DEFAULT_TOP_N, RankedResult, cosine_similarity, rank, rank_by_cosine};
pub use tokens::{TokenAccountant, TokenCounter, count_tokens};
