//! Message types shared by providers, the engine and channels.

use serde::{Deserialize, Serialize};

/// Chat role in the OpenAI message format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw provider answer: the first choice, as returned.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Whether a conversation is one-to-one or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadType {
    Direct,
    Group,
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub channel: String,
    pub thread_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub content: String,
    pub thread_type: ThreadType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub reply_to: Option<String>,
}

/// Text formatting the channel should apply to an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Html,
    Markdown,
}

/// A message to send through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub thread_id: String,
    pub content: String,
    pub parse_mode: Option<ParseMode>,
    pub reply_to: Option<String>,
}

impl OutgoingMessage {
    /// Plain-text reply into the same thread.
    pub fn reply(incoming: &IncomingMessage, content: impl Into<String>) -> Self {
        Self {
            thread_id: incoming.thread_id.clone(),
            content: content.into(),
            parse_mode: None,
            reply_to: None,
        }
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = Some(mode);
        self
    }
}
