//! # RagBot Channels
//! Chat front ends that deliver questions to the engine and answers back.

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramConfig};
