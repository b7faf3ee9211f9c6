//! Backend-agnostic store trait for client state and the message log.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::engine::{ConversationState, MessageRecord};
use crate::error::StoreError;

/// Aggregate counters for the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub total_clients: i64,
    pub total_messages: i64,
    /// Clients parked in the terminal service-requested stage.
    pub clients_awaiting_service: i64,
    pub messages_last_24h: i64,
}

/// Per-day counters for the daily report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DailyStats {
    pub new_clients: i64,
    pub messages: i64,
    pub service_requests: i64,
}

/// The persistence interface consumed by the transport layer.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Load a sender's state. `Ok(None)` for senders never seen before; a
    /// row whose stage can't be recognized is a corrupt-state error.
    async fn get_client(&self, sender: &str) -> Result<Option<ConversationState>, StoreError>;

    /// Upsert a sender's state, bumping the last-interaction timestamp.
    async fn put_client(&self, sender: &str, state: &ConversationState) -> Result<(), StoreError>;

    /// Append one immutable message-log entry.
    async fn append_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    async fn daily_stats(&self, day: NaiveDate) -> Result<DailyStats, StoreError>;
}
