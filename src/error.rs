//! Error types for the bot.
//!
//! Validation failures (bad menu choice, malformed e-mail) are *not* errors:
//! the state machine handles them as normal outcomes that re-prompt the
//! client. The enums here cover the things that can actually go wrong around
//! the machine: configuration, persistence, and the two external capabilities
//! (notification channel, generative fallback).

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Fallback error: {0}")]
    Fallback(#[from] FallbackError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors. These surface to the client as a generic
/// technical-difficulty reply; the turn's state mutation is not committed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt persisted state for {sender}: {reason}")]
    CorruptState { sender: String, reason: String },
}

/// Notification channel errors. Recovered locally: the buffered entries stay
/// queued for a later flush attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    #[error("Notification channel rejected message: {0}")]
    Rejected(String),
}

/// Generative fallback errors. Recovered locally with a canned reply.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("Fallback request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response from fallback provider: {0}")]
    InvalidResponse(String),

    #[error("Fallback provider not configured")]
    NotConfigured,
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
