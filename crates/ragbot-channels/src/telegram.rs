//! Telegram Bot channel — long polling + message sending via Bot API.

use async_trait::async_trait;
use futures::stream::Stream;
use ragbot_core::config::TelegramChannelConfig;
use ragbot_core::error::{RagBotError, Result};
use ragbot_core::traits::Channel;
use ragbot_core::types::{IncomingMessage, OutgoingMessage, ParseMode, ThreadType};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Telegram refuses messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Empty means every chat is served.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_poll_interval() -> u64 {
    1
}
fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

impl From<&TelegramChannelConfig> for TelegramConfig {
    fn from(cfg: &TelegramChannelConfig) -> Self {
        Self {
            bot_token: cfg.bot_token.clone(),
            poll_interval: cfg.poll_interval,
            allowed_chat_ids: cfg.allowed_chat_ids.clone(),
            api_base: default_api_base(),
        }
    }
}

/// Telegram Bot channel with polling loop.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: i64,
    connected: bool,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            last_update_id: 0,
            connected: false,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    fn is_allowed(&self, chat_id: i64) -> bool {
        self.config.allowed_chat_ids.is_empty() || self.config.allowed_chat_ids.contains(&chat_id)
    }

    /// Get updates using long polling.
    pub async fn get_updates(&mut self) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (self.last_update_id + 1).to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| RagBotError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| RagBotError::Channel(format!("Invalid Telegram response: {e}")))?;

        if !body.ok {
            return Err(RagBotError::Channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            self.last_update_id = last.update_id;
        }
        Ok(updates)
    }

    /// Send a text message, split into Telegram-sized parts when needed.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        for part in split_message(text, MAX_MESSAGE_CHARS) {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": part,
            });
            if let Some(mode) = parse_mode {
                body["parse_mode"] = serde_json::json!(parse_mode_name(mode));
            }

            let response = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| RagBotError::Channel(format!("sendMessage failed: {e}")))?;

            let result: TelegramApiResponse<serde_json::Value> = response
                .json()
                .await
                .map_err(|e| RagBotError::Channel(format!("Invalid send response: {e}")))?;

            if !result.ok {
                return Err(RagBotError::Channel(format!(
                    "Send failed: {}",
                    result.description.unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    /// Send typing indicator.
    pub async fn send_chat_typing(&self, chat_id: i64) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": "typing",
        });
        let _ = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await;
        Ok(())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| RagBotError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| RagBotError::Channel(format!("Invalid getMe response: {e}")))?;
        if !body.ok {
            return Err(RagBotError::Channel(format!(
                "getMe rejected: {}",
                body.description.unwrap_or_default()
            )));
        }
        body.result
            .ok_or_else(|| RagBotError::Channel("No bot info".into()))
    }

    /// Start polling loop — returns a stream of IncomingMessages.
    ///
    /// Sending needs a second handle: build another `TelegramChannel` from
    /// the same config.
    pub fn start_polling(self) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut channel = self;
            tracing::info!("Telegram polling loop started");

            loop {
                match channel.get_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            let Some(msg) = update.to_incoming() else {
                                continue;
                            };
                            if !msg
                                .thread_id
                                .parse::<i64>()
                                .is_ok_and(|id| channel.is_allowed(id))
                            {
                                tracing::debug!("Ignoring message from chat {}", msg.thread_id);
                                continue;
                            }
                            if tx.send(msg).is_err() {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                if tx.is_closed() {
                    tracing::info!("Telegram polling stopped (receiver dropped)");
                    return;
                }
                tokio::time::sleep(tokio::time::Duration::from_secs(
                    channel.config.poll_interval,
                ))
                .await;
            }
        });

        TelegramPollingStream { rx }
    }
}

fn parse_mode_name(mode: ParseMode) -> &'static str {
    match mode {
        ParseMode::Html => "HTML",
        ParseMode::Markdown => "Markdown",
    }
}

/// Split `text` into pieces of at most `max_chars` characters, preferring
/// line breaks as cut points.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let hard_cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = match rest[..hard_cut].rfind('\n') {
            Some(i) if i > 0 => i + 1,
            _ => hard_cut,
        };
        parts.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    parts.push(rest);
    parts
}

/// Stream of incoming Telegram messages from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingMessage>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<()> {
        let me = self.get_me().await?;
        tracing::info!(
            "Telegram bot: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        );
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let chat_id: i64 = message
            .thread_id
            .parse()
            .map_err(|_| RagBotError::Channel("Invalid chat_id".into()))?;
        self.send_message(chat_id, &message.content, message.parse_mode)
            .await
    }

    async fn send_typing(&self, thread_id: &str) -> Result<()> {
        if let Ok(chat_id) = thread_id.parse::<i64>() {
            self.send_chat_typing(chat_id).await?;
        }
        Ok(())
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

impl TelegramUpdate {
    /// Convert to RagBot IncomingMessage.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;

        // Skip bot messages
        if from.is_bot {
            return None;
        }

        Some(IncomingMessage {
            channel: "telegram".into(),
            thread_id: msg.chat.id.to_string(),
            sender_id: from.id.to_string(),
            sender_name: Some(from.first_name.clone()),
            sender_last_name: from.last_name.clone(),
            content: text.clone(),
            thread_type: match msg.chat.chat_type.as_str() {
                "private" => ThreadType::Direct,
                _ => ThreadType::Group,
            },
            timestamp: chrono::DateTime::from_timestamp(msg.date, 0)
                .unwrap_or_else(chrono::Utc::now),
            reply_to: msg
                .reply_to_message
                .as_ref()
                .map(|r| r.message_id.to_string()),
        })
    }
}
