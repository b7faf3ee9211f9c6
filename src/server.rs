//! HTTP transport: the WhatsApp webhook plus the operational endpoints.
//!
//! The webhook handler owns turn orchestration: per-sender serialization,
//! state load/persist, the message log, aggregator bookkeeping, and the
//! direct urgent pushes. The state machine itself stays pure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::content;
use crate::engine::{Classification, Engine, MessageRecord, Outcome};
use crate::error::StoreError;
use crate::notify::Notifier;
use crate::store::ClientStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn ClientStore>,
    pub aggregator: Arc<Aggregator>,
    pub notifier: Arc<dyn Notifier>,
    /// Per-sender turn locks. Two webhook deliveries for the same sender
    /// serialize here; different senders proceed in parallel.
    locks: Arc<tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<Engine>,
        store: Arc<dyn ClientStore>,
        aggregator: Arc<Aggregator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine,
            store,
            aggregator,
            notifier,
            locks: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            started_at: Instant::now(),
        }
    }

    async fn sender_lock(&self, sender: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(sender.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// Build the router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/zap", post(webhook))
        .route("/debug-state", get(debug_state))
        .route("/daily-stats", get(daily_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Webhook ─────────────────────────────────────────────────────────────

/// Twilio webhook form fields (capitalized per their convention).
#[derive(Debug, Deserialize)]
pub struct TwilioForm {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

async fn webhook(
    State(state): State<AppState>,
    axum::extract::Form(form): axum::extract::Form<TwilioForm>,
) -> impl IntoResponse {
    let reply = run_turn(&state, &form.from, &form.body).await;
    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_reply(&reply),
    )
}

/// Process one inbound message end to end and return the reply text.
///
/// Every failure inside the turn degrades to a generic technical-difficulty
/// reply; the webhook always answers the client.
pub async fn run_turn(state: &AppState, sender: &str, input: &str) -> String {
    let lock = state.sender_lock(sender).await;
    let _guard = lock.lock().await;

    match try_run_turn(state, sender, input).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(sender, error = %e, "turn failed");
            let name = state
                .store
                .get_client(sender)
                .await
                .ok()
                .flatten()
                .and_then(|s| s.name);
            content::technical_difficulty(name.as_deref())
        }
    }
}

async fn try_run_turn(
    state: &AppState,
    sender: &str,
    input: &str,
) -> Result<String, StoreError> {
    let outcome = match state.store.get_client(sender).await {
        Ok(persisted) => state.engine.handle(input, persisted.as_ref()).await,
        Err(StoreError::CorruptState { reason, .. }) => {
            // Unrecognizable persisted stage: answer free-form rather than
            // refusing the client, leave the row for a greeting to reset.
            warn!(sender, reason, "corrupt persisted state, answering free-form");
            state.engine.freeform_reply(None, input).await
        }
        Err(e) => return Err(e),
    };

    let Outcome {
        reply,
        state: next_state,
        classification,
        profile_updates,
        greeting_reset,
    } = outcome;

    // A greeting reset drains whatever the previous conversation left
    // buffered before the fresh one starts accumulating.
    if greeting_reset {
        state.aggregator.flush(sender, true).await;
    }

    let display_name = next_state.as_ref().and_then(|s| s.name.clone());

    if let Some(ref next) = next_state {
        state.store.put_client(sender, next).await?;
    }
    state
        .store
        .append_message(&MessageRecord {
            sender: sender.to_string(),
            input: input.to_string(),
            reply: reply.clone(),
            needs_human: classification.needs_human(),
            timestamp: Utc::now(),
        })
        .await?;

    state
        .aggregator
        .append(
            sender,
            display_name.as_deref(),
            input,
            &reply,
            classification,
        )
        .await;
    for (key, value) in &profile_updates {
        state.aggregator.set_profile(sender, key, value).await;
    }

    // Direct pushes go out immediately, ahead of the aggregated transcript.
    match classification {
        Classification::Urgent => {
            if let Err(e) = state
                .notifier
                .send_urgent(
                    "🔴 *URGENTE: Cliente precisa de atendimento especializado!*",
                    display_name.as_deref(),
                    Some(sender),
                )
                .await
            {
                warn!(sender, error = %e, "urgent push failed");
            }
        }
        Classification::IntakeComplete => {
            let mut text =
                String::from("✅ *CLIENTE COMPLETOU PLANEJAMENTO DE VIAGEM*");
            let profile = state.aggregator.profile(sender).await;
            if !profile.is_empty() {
                text.push('\n');
                for (key, value) in &profile {
                    text.push_str(&format!("\n- *{key}*: {value}"));
                }
            }
            if let Err(e) = state
                .notifier
                .send_urgent(&text, display_name.as_deref(), Some(sender))
                .await
            {
                warn!(sender, error = %e, "intake-complete push failed");
            }
        }
        Classification::None => {}
    }

    state
        .aggregator
        .flush(sender, classification.needs_human())
        .await;

    Ok(reply)
}

/// Minimal TwiML envelope around the reply text.
fn twiml_reply(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Message>{}</Message></Response>",
        xml_escape(text)
    )
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Operational endpoints ───────────────────────────────────────────────

async fn home() -> &'static str {
    "🚢 Travessia dos Sonhos - assistente virtual ativo"
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(stats) => Json(serde_json::json!({
            "status": "ok",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "active_buffers": state.aggregator.buffer_count().await,
            "stats": stats,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "health stats query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "degraded", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct DebugStateQuery {
    phone: String,
}

async fn debug_state(
    State(state): State<AppState>,
    Query(query): Query<DebugStateQuery>,
) -> impl IntoResponse {
    match state.store.get_client(&query.phone).await {
        Ok(Some(client)) => Json(serde_json::json!({
            "phone": query.phone,
            "state": client,
            "profile": state.aggregator.profile(&query.phone).await,
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown phone" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct DailyStatsQuery {
    #[serde(default)]
    notify: bool,
}

async fn daily_stats(
    State(state): State<AppState>,
    Query(query): Query<DailyStatsQuery>,
) -> impl IntoResponse {
    let today = Utc::now().date_naive();
    let stats = match state.store.daily_stats(today).await {
        Ok(stats) => stats,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if query.notify {
        let report = format!(
            "📊 *Relatório Diário - {}*\n\n\
             👥 Novos clientes: {}\n\
             💬 Mensagens trocadas: {}\n\
             ⚠️ Solicitações de atendimento: {}",
            today.format("%d/%m/%Y"),
            stats.new_clients,
            stats.messages,
            stats.service_requests,
        );
        if let Err(e) = state.notifier.send(&report).await {
            warn!(error = %e, "daily report notification failed");
        } else {
            info!("daily report sent");
        }
    }

    Json(serde_json::json!({ "date": today.format("%Y-%m-%d").to_string(), "stats": stats }))
        .into_response()
}
