//! Persisted per-client conversation state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::stage::Stage;

/// State persisted per sender, keyed by the phone-like sender id.
///
/// `attributes` is a deliberately open mapping: each completed menu step
/// merges one key (`experiencia_previa`, `interesse_principal`,
/// `periodo_viagem`, `duracao`, `destino`, `metodo_contato`,
/// `horario_contato`). Keys accumulate monotonically; nothing ever removes
/// one once a stage is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub name: Option<String>,
    pub email: Option<String>,
    pub stage: Stage,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ConversationState {
    /// Fresh state for a new conversation: first thing we ask is the name.
    pub fn new() -> Self {
        Self {
            name: None,
            email: None,
            stage: Stage::AwaitingName,
            attributes: BTreeMap::new(),
        }
    }

    /// Copy of this state moved to another stage.
    pub fn at_stage(&self, stage: Stage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }

    /// Copy of this state moved to `stage` with one attribute merged in.
    pub fn advanced(&self, stage: Stage, key: &str, value: &str) -> Self {
        let mut next = self.at_stage(stage);
        next.attributes.insert(key.to_string(), value.to_string());
        next
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

/// One immutable message-log entry, created once per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: String,
    pub input: String,
    pub reply: String,
    pub needs_human: bool,
    pub timestamp: DateTime<Utc>,
}
