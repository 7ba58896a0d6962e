//! Bot dispatcher — maps chat messages to replies.
//!
//! `/start` and `/help` are answered from configuration; every other text,
//! unknown commands included, is a question for the [`RagEngine`].

use std::sync::Arc;
use std::time::Duration;

use ragbot_core::config::BotConfig;
use ragbot_core::types::{IncomingMessage, OutgoingMessage, ParseMode};

use crate::engine::RagEngine;

/// What an incoming message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Help,
    Question(&'a str),
}

impl<'a> Command<'a> {
    /// Classify `text`. Commands may carry a `@botname` suffix.
    /// Returns `None` for blank text.
    pub fn parse(text: &'a str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix('/') {
            let word = rest.split_whitespace().next().unwrap_or_default();
            let name = word.split('@').next().unwrap_or_default();
            match name {
                "start" => return Some(Command::Start),
                "help" => return Some(Command::Help),
                _ => {}
            }
        }
        Some(Command::Question(trimmed))
    }
}

pub struct BotDispatcher {
    engine: Arc<RagEngine>,
    bot: BotConfig,
}

impl BotDispatcher {
    pub fn new(engine: Arc<RagEngine>, bot: BotConfig) -> Self {
        Self { engine, bot }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.query_timeout_secs)
    }

    /// Build the reply for `msg`, if any. Query failures become the
    /// configured apology; they are logged, never propagated.
    pub async fn handle(&self, msg: &IncomingMessage) -> Option<OutgoingMessage> {
        let command = Command::parse(&msg.content)?;

        let reply = match command {
            Command::Start => OutgoingMessage::reply(msg, self.bot.start_text.as_str()),
            Command::Help => OutgoingMessage::reply(msg, self.help_html(msg))
                .with_parse_mode(ParseMode::Html),
            Command::Question(question) => {
                tracing::info!(
                    "❓ [{}] question from {}: {}",
                    msg.channel,
                    msg.sender_id,
                    truncate(question, 80)
                );
                match self
                    .engine
                    .ask_with_deadline(question, self.query_timeout())
                    .await
                {
                    Ok(answer) => OutgoingMessage::reply(msg, answer),
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ [{}] query from {} failed ({}): {}",
                            msg.channel,
                            msg.sender_id,
                            e.kind(),
                            e
                        );
                        OutgoingMessage::reply(msg, self.bot.failure_text.as_str())
                    }
                }
            }
        };
        Some(reply)
    }

    fn help_html(&self, msg: &IncomingMessage) -> String {
        let name = msg
            .sender_last_name
            .as_deref()
            .or(msg.sender_name.as_deref())
            .unwrap_or_default();
        format!(
            "<b>{}.\n{}</b>",
            escape_html(name),
            escape_html(&self.bot.help_text)
        )
    }
}

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionClient;
    use async_trait::async_trait;
    use ragbot_core::error::{FailureReason, RagBotError, Result};
    use ragbot_core::traits::{ChatProvider, EmbeddingProvider, GenerateParams};
    use ragbot_core::types::{ChatResponse, Message, ThreadType};
    use ragbot_knowledge::{Corpus, CorpusEntry, TokenCounter};

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct FakeChat {
        fail: bool,
    }

    #[async_trait]
    impl ChatProvider for FakeChat {
        fn name(&self) -> &str {
            "fake"
        }

        async fn chat(&self, _messages: &[Message], _params: &GenerateParams) -> Result<ChatResponse> {
            if self.fail {
                return Err(RagBotError::completion(FailureReason::RateLimited, "slow down"));
            }
            Ok(ChatResponse {
                content: Some("My Fair Lady".into()),
                ..ChatResponse::default()
            })
        }
    }

    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn model(&self) -> &str {
            "chars"
        }

        fn count_tokens(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn dispatcher(fail: bool) -> BotDispatcher {
        let corpus = Corpus::from_entries(vec![CorpusEntry::new(
            "Winner: My Fair Lady",
            vec![1.0, 0.0],
        )])
        .unwrap();
        let engine = RagEngine::new(
            Arc::new(corpus),
            Arc::new(FixedEmbedder),
            CompletionClient::new(Arc::new(FakeChat { fail }), "gpt-3.5-turbo", "sys"),
            Arc::new(CharCounter),
        );
        BotDispatcher::new(Arc::new(engine), BotConfig::default())
    }

    fn incoming(text: &str, last_name: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            channel: "telegram".into(),
            thread_id: "42".into(),
            sender_id: "7".into(),
            sender_name: Some("Ann".into()),
            sender_last_name: last_name.map(String::from),
            content: text.into(),
            thread_type: ThreadType::Direct,
            timestamp: chrono::Utc::now(),
            reply_to: None,
        }
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/help@oscar_bot"), Some(Command::Help));
        assert_eq!(Command::parse("  /help extra"), Some(Command::Help));
        assert_eq!(Command::parse("/weather"), Some(Command::Question("/weather")));
        assert_eq!(Command::parse(" Who won? "), Some(Command::Question("Who won?")));
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Tom & <Jerry>"), "Tom &amp; &lt;Jerry&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ёжик", 2), "ёж");
    }

    #[tokio::test]
    async fn test_start_reply() {
        let reply = dispatcher(false).handle(&incoming("/start", None)).await.unwrap();
        assert_eq!(reply.content, "Ask the bot a question.");
        assert_eq!(reply.thread_id, "42");
        assert_eq!(reply.parse_mode, None);
    }

    #[tokio::test]
    async fn test_help_prefers_last_name() {
        let d = dispatcher(false);
        let reply = d.handle(&incoming("/help", Some("<Lee>"))).await.unwrap();
        assert_eq!(reply.parse_mode, Some(ParseMode::Html));
        assert_eq!(
            reply.content,
            "<b>&lt;Lee&gt;.\nThis bot answers questions about the 37th Academy Awards.</b>"
        );

        let reply = d.handle(&incoming("/help", None)).await.unwrap();
        assert!(reply.content.starts_with("<b>Ann.\n"));
    }

    #[tokio::test]
    async fn test_question_answered() {
        let reply = dispatcher(false)
            .handle(&incoming("Best Picture?", None))
            .await
            .unwrap();
        assert_eq!(reply.content, "My Fair Lady");
    }

    #[tokio::test]
    async fn test_failure_becomes_apology() {
        let reply = dispatcher(true)
            .handle(&incoming("Best Picture?", None))
            .await
            .unwrap();
        assert_eq!(reply.content, BotConfig::default().failure_text);
    }

    #[tokio::test]
    async fn test_blank_message_ignored() {
        assert!(dispatcher(false).handle(&incoming("  ", None)).await.is_none());
    }
}
