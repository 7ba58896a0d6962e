//! # RagBot Agent
//! Question answering over the knowledge base, plus the chat-command layer.
//!
//! - [`engine::RagEngine`]: embed the question, rank passages, pack them
//!   under the token budget, ask the chat model.
//! - [`completion::CompletionClient`]: the single system + user exchange.
//! - [`dispatch::BotDispatcher`]: `/start`, `/help`, and questions.

pub mod completion;
pub mod dispatch;
pub mod engine;

pub use completion::CompletionClient;
pub use dispatch::{BotDispatcher, Command};
pub use engine::{DEFAULT_TOKEN_BUDGET, RagEngine};
