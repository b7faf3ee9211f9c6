//! Integration tests for the webhook server.
//!
//! Each test spins up an Axum server on a random port against an in-memory
//! store, posts Twilio-shaped forms at /zap, and checks the TwiML replies
//! plus the operational endpoints.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use travessia_bot::aggregator::Aggregator;
use travessia_bot::engine::Engine;
use travessia_bot::error::{FallbackError, NotifyError};
use travessia_bot::llm::Fallback;
use travessia_bot::notify::Notifier;
use travessia_bot::server::{AppState, routes};
use travessia_bot::store::{ClientStore, LibSqlStore};

const SENDER: &str = "whatsapp:+5511915290344";

struct StubFallback;

#[async_trait]
impl Fallback for StubFallback {
    async fn generate(
        &self,
        _name: Option<&str>,
        _input: &str,
        _knowledge: &[(&str, &str)],
    ) -> Result<String, FallbackError> {
        Ok("resposta livre do assistente".to_string())
    }
}

struct RecordingNotifier {
    sends: AtomicUsize,
    urgent: AtomicUsize,
    last: StdMutex<Option<String>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sends: AtomicUsize::new(0),
            urgent: AtomicUsize::new(0),
            last: StdMutex::new(None),
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<bool, NotifyError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(text.to_string());
        Ok(true)
    }

    async fn send_urgent(
        &self,
        text: &str,
        _client_name: Option<&str>,
        _sender: Option<&str>,
    ) -> Result<bool, NotifyError> {
        self.urgent.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(text.to_string());
        Ok(true)
    }
}

/// Start the server on a random port, return its base URL plus test handles.
async fn start_server() -> (String, Arc<dyn ClientStore>, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    let store: Arc<dyn ClientStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());

    let state = AppState::new(
        Arc::new(Engine::with_rng_seed(Arc::new(StubFallback), 42)),
        Arc::clone(&store),
        Arc::new(Aggregator::new(notifier.clone())),
        notifier.clone(),
    );
    let app = routes(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), store, notifier)
}

/// Post one webhook turn and return the TwiML body.
async fn post_turn(client: &reqwest::Client, base: &str, body: &str) -> String {
    client
        .post(format!("{base}/zap"))
        .form(&[("From", SENDER), ("Body", body)])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

#[tokio::test]
async fn full_intake_flow_over_http() {
    let (base, store, notifier) = start_server().await;
    let client = reqwest::Client::new();

    let reply = post_turn(&client, &base, "olá").await;
    assert!(reply.starts_with("<?xml"));
    assert!(reply.contains("Travessia dos Sonhos"));

    post_turn(&client, &base, "Ana Souza").await;
    post_turn(&client, &base, "ana@exemplo.com").await;

    // Main menu option 2: plan a trip. Then walk every intake question.
    post_turn(&client, &base, "2").await; // period menu
    post_turn(&client, &base, "1").await; // Jan-Mar
    post_turn(&client, &base, "dois").await; // spelled-out duration option
    post_turn(&client, &base, "6").await; // Alasca
    post_turn(&client, &base, "1").await; // WhatsApp
    let last = post_turn(&client, &base, "3").await; // afternoon

    assert!(last.contains("Ana Souza"));

    let persisted = store.get_client(SENDER).await.unwrap().unwrap();
    assert_eq!(persisted.stage.as_str(), "atendimento_solicitado");
    assert_eq!(persisted.name.as_deref(), Some("Ana Souza"));
    assert_eq!(persisted.email.as_deref(), Some("ana@exemplo.com"));
    assert_eq!(
        persisted.attributes["periodo_viagem"],
        "Primeiros meses (Jan-Mar)"
    );
    assert_eq!(persisted.attributes["duracao"], "Cruzeiro padrão (6-9 dias)");
    assert_eq!(persisted.attributes["destino"], "Alasca");
    assert_eq!(persisted.attributes["metodo_contato"], "WhatsApp");

    // Intake completion pushed a direct alert and force-flushed the
    // transcript.
    assert_eq!(notifier.urgent.load(Ordering::SeqCst), 1);
    assert!(notifier.sends.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn invalid_option_reprompts_without_advancing() {
    let (base, store, _) = start_server().await;
    let client = reqwest::Client::new();

    post_turn(&client, &base, "oi").await;
    post_turn(&client, &base, "Bruno").await;
    post_turn(&client, &base, "bruno@exemplo.com").await;

    let reply = post_turn(&client, &base, "99").await;
    assert!(reply.contains("Bruno"));

    let persisted = store.get_client(SENDER).await.unwrap().unwrap();
    assert_eq!(persisted.stage.as_str(), "menu");
}

#[tokio::test]
async fn greeting_resets_a_finished_conversation() {
    let (base, store, _) = start_server().await;
    let client = reqwest::Client::new();

    post_turn(&client, &base, "oi").await;
    post_turn(&client, &base, "Carla").await;
    post_turn(&client, &base, "carla@exemplo.com").await;
    post_turn(&client, &base, "3").await; // straight to a human

    let persisted = store.get_client(SENDER).await.unwrap().unwrap();
    assert_eq!(persisted.stage.as_str(), "atendimento_solicitado");

    // Terminal stage is sticky for ordinary messages.
    post_turn(&client, &base, "2").await;
    let persisted = store.get_client(SENDER).await.unwrap().unwrap();
    assert_eq!(persisted.stage.as_str(), "atendimento_solicitado");

    // Only a greeting starts over.
    let reply = post_turn(&client, &base, "bom dia").await;
    assert!(reply.contains("Travessia dos Sonhos"));
    let persisted = store.get_client(SENDER).await.unwrap().unwrap();
    assert_eq!(persisted.stage.as_str(), "aguardando_nome");
    assert_eq!(persisted.name, None);
}

#[tokio::test]
async fn unknown_sender_freeform_goes_to_fallback() {
    let (base, store, _) = start_server().await;
    let client = reqwest::Client::new();

    let reply = post_turn(&client, &base, "vocês têm cruzeiro pro Caribe?").await;
    assert!(reply.contains("resposta livre do assistente"));
    assert!(store.get_client(SENDER).await.unwrap().is_none());
}

#[tokio::test]
async fn operational_endpoints_respond() {
    let (base, _, _) = start_server().await;
    let client = reqwest::Client::new();

    let home = client.get(&base).send().await.unwrap();
    assert!(home.status().is_success());

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["stats"]["total_clients"], 0);

    // Unknown phone is a 404.
    let resp = client
        .get(format!("{base}/debug-state?phone=whatsapp:%2B000"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    post_turn(&client, &base, "oi").await;
    let debug: serde_json::Value = client
        .get(format!("{base}/debug-state"))
        .query(&[("phone", SENDER)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(debug["state"]["stage"], "aguardando_nome");

    let stats: serde_json::Value = client
        .get(format!("{base}/daily-stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["stats"]["new_clients"], 1);
    assert_eq!(stats["stats"]["messages"], 1);
}

#[tokio::test]
async fn daily_stats_notify_sends_report() {
    let (base, _, notifier) = start_server().await;
    let client = reqwest::Client::new();

    post_turn(&client, &base, "oi").await;

    let resp = client
        .get(format!("{base}/daily-stats?notify=true"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    let report = notifier.last.lock().unwrap().clone().unwrap();
    assert!(report.contains("Relatório Diário"));
}
