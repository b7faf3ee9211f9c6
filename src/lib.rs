//! Travessia dos Sonhos WhatsApp assistant.
//!
//! A menu-driven conversational intake bot for a cruise travel agency: a
//! pure per-turn state machine over persisted client state, a per-sender
//! delivery aggregator that batches conversation transcripts to the
//! operations Telegram chat, and a generative fallback for off-script
//! questions.

pub mod aggregator;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod llm;
pub mod notify;
pub mod server;
pub mod store;

pub use error::{Error, Result};
