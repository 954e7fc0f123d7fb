// # Telegram Notification Transport
//
// Delivers operator notifications through the Telegram Bot API
// (`POST /bot<token>/sendMessage`).
//
// Rich messages are sent with `parse_mode = MarkdownV2`. The core writes
// them with `*bold*` markup only, so every other reserved character is
// escaped here before sending.
//
// ### Trust Level: Untrusted (Notification Transport)
//
// One request per `send`, no retries. Buffering and replay belong to the
// core `NotificationDispatcher`.
//
// ## Security Requirements
//
// The bot token is part of the request URL. It NEVER appears in logs,
// `Debug` output or returned errors.

use async_trait::async_trait;
use failover_core::config::TelegramConfig;
use failover_core::traits::NotificationTransport;
use failover_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram Bot API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default HTTP timeout for one send
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// MarkdownV2 reserved characters, minus `*` which the core uses for bold
const ESCAPED: &[char] = &[
    '\\', '_', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape text for MarkdownV2, leaving `*` markup intact
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if ESCAPED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API transport
pub struct TelegramTransport {
    /// Bot token
    /// ⚠️ NEVER log this value
    bot_token: String,

    /// Target chat
    chat_id: String,

    /// API base URL (overridable for tests)
    base_url: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the bot token
impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("bot_token", &"<REDACTED>")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TelegramTransport {
    /// Create a transport talking to the public Bot API
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(bot_token, chat_id, TELEGRAM_API_BASE)
    }

    /// Create a transport from the core configuration section
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(config.bot_token.clone(), config.chat_id.clone())
    }

    /// Create a transport against a different API base URL
    pub fn with_base_url(
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let bot_token = bot_token.into();
        let chat_id = chat_id.into();

        if bot_token.is_empty() {
            return Err(Error::config("Telegram bot token cannot be empty"));
        }
        if chat_id.is_empty() {
            return Err(Error::config("Telegram chat ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            bot_token,
            chat_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Strip the token from anything that may echo the request URL
    fn redact(&self, message: String) -> String {
        message.replace(&self.bot_token, "<REDACTED>")
    }
}

#[async_trait]
impl NotificationTransport for TelegramTransport {
    async fn send(&self, text: &str, rich: bool) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let escaped;
        let body = if rich {
            escaped = escape_markdown(text);
            SendMessage {
                chat_id: &self.chat_id,
                text: &escaped,
                parse_mode: Some("MarkdownV2"),
            }
        } else {
            SendMessage {
                chat_id: &self.chat_id,
                text,
                parse_mode: None,
            }
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::notification(self.redact(format!("Telegram request failed: {}", e))))?;

        let status = response.status();
        let parsed: Option<ApiResponse> = response.json().await.ok();

        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                tracing::debug!("Telegram message delivered to chat {}", self.chat_id);
                Ok(())
            }
            Some(ApiResponse { description, .. }) => Err(Error::notification(format!(
                "Telegram API error ({}): {}",
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(Error::notification(format!(
                "Telegram API returned {} with an unreadable body",
                status
            ))),
        }
    }

    fn transport_name(&self) -> &'static str {
        "telegram"
    }
}
