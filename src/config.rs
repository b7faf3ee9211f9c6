//! Runtime configuration, read from the environment.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration.
///
/// Telegram and OpenAI are optional capabilities: without a Telegram token
/// the aggregator runs against a no-op notifier, and without an OpenAI key
/// off-script questions get a canned unavailable reply.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port for the webhook server.
    pub port: u16,
    /// Path to the local database file.
    pub db_path: PathBuf,
    /// Telegram bot token, if the operations channel is configured.
    pub telegram_bot_token: Option<SecretString>,
    /// Telegram chat id for the operations channel.
    pub telegram_chat_id: Option<String>,
    /// OpenAI API key for the generative fallback.
    pub openai_api_key: Option<SecretString>,
    /// OpenAI model for the generative fallback.
    pub openai_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("not a valid port number: {raw}"),
            })?,
            Err(_) => 5000,
        };

        let db_path = std::env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/travessia.db"));

        let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);
        let telegram_chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());

        // A token without a chat id (or vice versa) is a half-configured
        // channel; fail fast rather than silently dropping notifications.
        match (&telegram_bot_token, &telegram_chat_id) {
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("TELEGRAM_CHAT_ID".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()));
            }
            _ => {}
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        Ok(Self {
            port,
            db_path,
            telegram_bot_token,
            telegram_chat_id,
            openai_api_key,
            openai_model,
        })
    }

    pub fn telegram_enabled(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    pub fn fallback_enabled(&self) -> bool {
        self.openai_api_key.is_some()
    }
}
