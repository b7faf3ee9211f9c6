//! libSQL store — async `ClientStore` implementation over a local database
//! file (or `:memory:` in tests).

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::engine::{ConversationState, MessageRecord, Stage};
use crate::error::StoreError;
use crate::store::traits::{ClientStore, DailyStats, StoreStats};

/// Timestamp write format. Matches SQLite's `datetime()` output so the
/// `date(...)` comparisons in the stats queries work on raw strings.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// libSQL store backend.
///
/// Holds one connection reused for all operations; `libsql::Connection` is
/// `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and ensure the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("failed to create db directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        let conn = db.connect().map_err(|e| StoreError::Open(e.to_string()))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "database opened");
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        let conn = db.connect().map_err(|e| StoreError::Open(e.to_string()))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS clientes (
                     telefone TEXT PRIMARY KEY,
                     nome TEXT,
                     email TEXT,
                     estado TEXT NOT NULL,
                     dados TEXT NOT NULL DEFAULT '{}',
                     ultima_interacao TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS mensagens (
                     id INTEGER PRIMARY KEY AUTOINCREMENT,
                     telefone TEXT NOT NULL,
                     mensagem_cliente TEXT NOT NULL,
                     mensagem_bot TEXT NOT NULL,
                     timestamp TEXT NOT NULL,
                     precisa_atendimento INTEGER NOT NULL DEFAULT 0
                 );
                 CREATE INDEX IF NOT EXISTS idx_mensagens_telefone
                     ON mensagens(telefone);",
            )
            .await
            .map_err(|e| StoreError::Open(format!("schema init failed: {e}")))?;
        Ok(())
    }

    async fn count(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<i64, StoreError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .ok_or_else(|| StoreError::Query("count query returned no row".into()))?;
        row.get::<i64>(0)
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

#[async_trait]
impl ClientStore for LibSqlStore {
    async fn get_client(&self, sender: &str) -> Result<Option<ConversationState>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT nome, email, estado, dados FROM clientes WHERE telefone = ?1",
                params![sender],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        else {
            return Ok(None);
        };

        let name: Option<String> = row.get(0).ok();
        let email: Option<String> = row.get(1).ok();
        let stage_str: String = row.get(2).map_err(|e| StoreError::Query(e.to_string()))?;
        let data_json: String = row.get(3).unwrap_or_else(|_| "{}".to_string());

        let stage = Stage::from_str(&stage_str).map_err(|reason| StoreError::CorruptState {
            sender: sender.to_string(),
            reason,
        })?;
        let attributes: BTreeMap<String, String> =
            serde_json::from_str(&data_json).map_err(|e| StoreError::CorruptState {
                sender: sender.to_string(),
                reason: format!("bad attribute blob: {e}"),
            })?;

        Ok(Some(ConversationState {
            name,
            email,
            stage,
            attributes,
        }))
    }

    async fn put_client(&self, sender: &str, state: &ConversationState) -> Result<(), StoreError> {
        let data_json = serde_json::to_string(&state.attributes)
            .map_err(|e| StoreError::Query(format!("attribute serialization: {e}")))?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO clientes
                     (telefone, nome, email, estado, dados, ultima_interacao)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    sender,
                    state.name.as_deref(),
                    state.email.as_deref(),
                    state.stage.as_str(),
                    data_json,
                    format_ts(Utc::now()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn append_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO mensagens
                     (telefone, mensagem_cliente, mensagem_bot, timestamp, precisa_atendimento)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.sender.as_str(),
                    record.input.as_str(),
                    record.reply.as_str(),
                    format_ts(record.timestamp),
                    record.needs_human as i64,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            total_clients: self.count("SELECT COUNT(*) FROM clientes", ()).await?,
            total_messages: self.count("SELECT COUNT(*) FROM mensagens", ()).await?,
            clients_awaiting_service: self
                .count(
                    "SELECT COUNT(*) FROM clientes WHERE estado = ?1",
                    params![Stage::ServiceRequested.as_str()],
                )
                .await?,
            messages_last_24h: self
                .count(
                    "SELECT COUNT(*) FROM mensagens WHERE timestamp > datetime('now', '-1 day')",
                    (),
                )
                .await?,
        })
    }

    async fn daily_stats(&self, day: NaiveDate) -> Result<DailyStats, StoreError> {
        let day = day.format("%Y-%m-%d").to_string();
        Ok(DailyStats {
            new_clients: self
                .count(
                    "SELECT COUNT(*) FROM clientes WHERE date(ultima_interacao) = ?1",
                    params![day.as_str()],
                )
                .await?,
            messages: self
                .count(
                    "SELECT COUNT(*) FROM mensagens WHERE date(timestamp) = ?1",
                    params![day.as_str()],
                )
                .await?,
            service_requests: self
                .count(
                    "SELECT COUNT(*) FROM mensagens
                     WHERE date(timestamp) = ?1 AND precisa_atendimento = 1",
                    params![day.as_str()],
                )
                .await?,
        })
    }
}
