//! Telegram notifier — delivers aggregated conversations and urgent alerts
//! to the operations chat via the Bot API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::NotifyError;
use crate::notify::{Notifier, wa_me_link};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Request timeout. Delivery failures are recoverable; the aggregator keeps
/// undelivered entries for a later flush.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TelegramNotifier {
    bot_token: SecretString,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a single chunk (≤4096 chars), Markdown first with a plain-text
    /// retry — Telegram rejects the whole message when client text breaks
    /// its Markdown parsing.
    async fn send_chunk(&self, text: &str) -> Result<bool, NotifyError> {
        let markdown_body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(true);
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        if !plain_resp.status().is_success() {
            let detail = plain_resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!(
                "sendMessage failed (markdown: {markdown_status}, plain: {detail})"
            )));
        }

        Ok(true)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<bool, NotifyError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            if !self.send_chunk(&chunk).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn send_urgent(
        &self,
        text: &str,
        client_name: Option<&str>,
        sender: Option<&str>,
    ) -> Result<bool, NotifyError> {
        let mut full = text.to_string();

        let mut extra = Vec::new();
        if let Some(name) = client_name {
            extra.push(format!("👤 *Nome*: {name}"));
        }
        if let Some(sender) = sender {
            let link = wa_me_link(sender);
            extra.push(format!("📱 *Contato*: [{link}](https://{link})"));
        }
        if !extra.is_empty() {
            full.push_str("\n\n");
            full.push_str(&extra.join("\n"));
        }

        self.send(&full).await
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let boundary = (0..=max_len)
            .rev()
            .find(|&i| remaining.is_char_boundary(i))
            .unwrap_or(0);
        let window = &remaining[..boundary];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(boundary);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
