//! The conversation state machine.
//!
//! `Engine::handle` is the whole per-turn brain: given the persisted state
//! and the raw inbound text it produces the reply, the next state, and the
//! routing classification. It does no I/O of its own except the generative
//! fallback for free-form questions, which is injected as a trait object.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::content::{
    self, CONTACT_METHOD_MENU, CONTACT_TIME_MENU, DESTINATION_MENU, DURATION_MENU, EXPERIENCE_QUESTION,
    GREETING_PHRASES, GREETING_WORDS, HELP_WORDS, INTERESTS_MENU, INVALID_REPLIES, KNOWLEDGE_BASE,
    MAIN_MENU, PERIOD_MENU, START_COMMANDS, render_menu,
};
use crate::engine::menu::{is_valid_email, parse_option};
use crate::engine::stage::Stage;
use crate::engine::state::ConversationState;
use crate::llm::Fallback;

/// Per-turn routing tag. `Urgent` and `IntakeComplete` force an immediate
/// notification flush; everything else rides the debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    None,
    Urgent,
    IntakeComplete,
}

impl Classification {
    /// Whether this turn needs a human (drives the message-log flag and the
    /// force-flush policy).
    pub fn needs_human(&self) -> bool {
        matches!(self, Self::Urgent | Self::IntakeComplete)
    }
}

/// The result of one turn.
#[derive(Debug)]
pub struct Outcome {
    /// Text sent back to the client.
    pub reply: String,
    /// State to persist; `None` means the turn left the persisted state
    /// untouched (free-form fallback turns).
    pub state: Option<ConversationState>,
    pub classification: Classification,
    /// Profile facts collected this turn, in display form, for the
    /// aggregator's header (e.g. `("Destino desejado", "Brasil")`).
    pub profile_updates: Vec<(&'static str, String)>,
    /// Set when a greeting reset the conversation; the transport drains any
    /// stale notification buffer before starting fresh.
    pub greeting_reset: bool,
}

impl Outcome {
    fn reply_only(reply: String, state: &ConversationState) -> Self {
        Self {
            reply,
            state: Some(state.clone()),
            classification: Classification::None,
            profile_updates: Vec::new(),
            greeting_reset: false,
        }
    }
}

// Option-index → attribute label tables. Labels are what lands in
// `attributes` and in the notification profile; they differ slightly from
// the menu option texts on purpose (shorter).
const INTEREST_LABELS: [&str; 6] = [
    "Gastronomia",
    "Entretenimento",
    "Destinos exóticos",
    "Relaxamento",
    "Atividades para família",
    "Experiência completa",
];

const PERIOD_LABELS: [&str; 6] = [
    "Primeiros meses (Jan-Mar)",
    "Meio do ano (Abr-Jun)",
    "Férias de julho",
    "Segundo semestre (Ago-Out)",
    "Final do ano (Nov-Dez)",
    "Ainda não decidido",
];

const DURATION_LABELS: [&str; 5] = [
    "Mini-cruzeiro (3-5 dias)",
    "Cruzeiro padrão (6-9 dias)",
    "Cruzeiro estendido (10-14 dias)",
    "Longa duração (15+ dias)",
    "Ainda não decidido",
];

const DESTINATION_LABELS: [&str; 8] = [
    "Brasil",
    "Caribe e Bahamas",
    "Mediterrâneo",
    "Europa e Escandinávia",
    "América do Sul",
    "Alasca",
    "Ásia e Oceania",
    "Outro destino / Não decidido",
];

const CONTACT_METHOD_LABELS: [&str; 3] = ["WhatsApp", "Ligação telefônica", "Vídeo-chamada"];

const CONTACT_TIME_LABELS: [&str; 5] = [
    "Manhã (9h-12h)",
    "Horário de almoço (12h-14h)",
    "Tarde (14h-18h)",
    "Noite (18h-20h)",
    "Qualquer horário dentro do horário de atendimento",
];

/// Check whether a message is a greeting or start command. Case-insensitive;
/// greeting words/phrases match exactly or as a `word + space` prefix.
pub fn is_greeting(input: &str) -> bool {
    let msg = input.trim().to_lowercase();

    let matches_prefix = |candidates: &[&str]| {
        candidates
            .iter()
            .any(|g| msg == *g || msg.starts_with(&format!("{g} ")))
    };

    matches_prefix(GREETING_WORDS)
        || matches_prefix(GREETING_PHRASES)
        || START_COMMANDS.iter().any(|c| msg == *c)
}

/// The conversation state machine.
pub struct Engine {
    fallback: Arc<dyn Fallback>,
    rng: Mutex<StdRng>,
}

impl Engine {
    pub fn new(fallback: Arc<dyn Fallback>) -> Self {
        Self {
            fallback,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic invalid-reply selection, for tests.
    pub fn with_rng_seed(fallback: Arc<dyn Fallback>, seed: u64) -> Self {
        Self {
            fallback,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Process one turn. Pure except for the injected fallback call.
    pub async fn handle(&self, input: &str, state: Option<&ConversationState>) -> Outcome {
        // Greeting beats everything, including the terminal stage: the
        // conversation resets and any pending notification buffer is
        // drained by the transport.
        if is_greeting(input) {
            tracing::info!("greeting detected, resetting conversation");
            return Outcome {
                reply: content::WELCOME.to_string(),
                state: Some(ConversationState::new()),
                classification: Classification::None,
                profile_updates: Vec::new(),
                greeting_reset: true,
            };
        }

        let Some(state) = state else {
            // Unknown sender talking free-form: delegate to the fallback,
            // leave nothing persisted.
            return self.freeform_reply(None, input).await;
        };

        let name = state.name.clone();

        // Terminal stage is sticky: it re-answers but never transitions out
        // (only a greeting reset leaves it).
        if state.stage.is_terminal() {
            return self.handle_terminal(input, state, name.as_deref());
        }

        // "menu" navigation command, available once we know who we're
        // talking to. Below greeting detection, above per-stage handling.
        if input.trim().eq_ignore_ascii_case("menu") {
            if let Some(ref name) = name {
                let next = state.at_stage(Stage::Menu);
                return Outcome::reply_only(render_menu(&MAIN_MENU, Some(name)), &next);
            }
        }

        match state.stage {
            Stage::AwaitingName => self.handle_name(input, state),
            Stage::AwaitingEmail => self.handle_email(input, state),
            Stage::Menu => self.handle_menu(input, state),
            Stage::PostIntro => self.handle_post_intro(input, state),
            Stage::AskingInterests => self.handle_interests(input, state),
            Stage::PostInterests => self.handle_post_interests(input, state),
            Stage::AskingPeriod => self.handle_period(input, state),
            Stage::AskingDuration => self.handle_duration(input, state),
            Stage::AskingDestination => self.handle_destination(input, state),
            Stage::AskingContactMethod => self.handle_contact_method(input, state),
            Stage::AskingContactTime => self.handle_contact_time(input, state),
            Stage::ServiceRequested => unreachable!("terminal stage handled above"),
        }
    }

    /// Free-form reply via the generative fallback. Used for unknown senders
    /// and for clients whose persisted stage could not be recognized; the
    /// state is left untouched either way. Fallback failure is recovered
    /// locally with a canned reply, never propagated.
    pub async fn freeform_reply(&self, name: Option<&str>, input: &str) -> Outcome {
        let reply = match self.fallback.generate(name, input, KNOWLEDGE_BASE).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "generative fallback unavailable");
                content::fallback_unavailable(name)
            }
        };
        Outcome {
            reply,
            state: None,
            classification: Classification::None,
            profile_updates: Vec::new(),
            greeting_reset: false,
        }
    }

    fn pick_invalid_reply(&self) -> &'static str {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        INVALID_REPLIES[rng.gen_range(0..INVALID_REPLIES.len())]
    }

    /// `"{name}, {random invalid line}\n\n{re-prompt}"` with the state left
    /// exactly as it was.
    fn invalid_option(&self, state: &ConversationState, reprompt: &str) -> Outcome {
        let name = state.name.as_deref().unwrap_or("Olá");
        let reply = format!("{name}, {}\n\n{reprompt}", self.pick_invalid_reply());
        Outcome::reply_only(reply, state)
    }

    // ── Per-stage handlers ──────────────────────────────────────────

    fn handle_name(&self, input: &str, state: &ConversationState) -> Outcome {
        let mut next = state.at_stage(Stage::AwaitingEmail);
        next.name = Some(input.trim().to_string());
        Outcome::reply_only(content::ASK_EMAIL.to_string(), &next)
    }

    fn handle_email(&self, input: &str, state: &ConversationState) -> Outcome {
        let name = state.name.as_deref().unwrap_or("Olá");
        if !is_valid_email(input) {
            return Outcome::reply_only(content::invalid_email(name), state);
        }

        let email = input.trim().to_string();
        let mut next = state.at_stage(Stage::Menu);
        next.email = Some(email.clone());

        Outcome {
            reply: render_menu(&MAIN_MENU, Some(name)),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Email", email)],
            greeting_reset: false,
        }
    }

    fn handle_menu(&self, input: &str, state: &ConversationState) -> Outcome {
        let name = state.name.as_deref().unwrap_or("Olá").to_string();
        match parse_option(input, MAIN_MENU.options.len()) {
            Some(1) => {
                let next = state.at_stage(Stage::PostIntro);
                Outcome::reply_only(content::company_intro(&name), &next)
            }
            Some(2) => {
                let next = state.at_stage(Stage::AskingPeriod);
                Outcome::reply_only(render_menu(&PERIOD_MENU, Some(&name)), &next)
            }
            Some(3) => Outcome {
                reply: content::service_requested(&name),
                state: Some(state.at_stage(Stage::ServiceRequested)),
                classification: Classification::Urgent,
                profile_updates: Vec::new(),
                greeting_reset: false,
            },
            _ => self.invalid_option(state, &render_menu(&MAIN_MENU, Some(&name))),
        }
    }

    /// Prior-experience question after the company intro.
    ///
    /// Any internal fault here force-advances with `experiencia_previa =
    /// "Não especificada"` instead of surfacing the error; the fault is
    /// logged at warn so it stays distinguishable from a plain invalid
    /// answer.
    fn handle_post_intro(&self, input: &str, state: &ConversationState) -> Outcome {
        match self.post_intro_inner(input, state) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "post-intro processing fault, force-advancing");
                let next = state.advanced(
                    Stage::AskingInterests,
                    "experiencia_previa",
                    "Não especificada",
                );
                Outcome::reply_only(
                    render_menu(&INTERESTS_MENU, state.name.as_deref()),
                    &next,
                )
            }
        }
    }

    fn post_intro_inner(
        &self,
        input: &str,
        state: &ConversationState,
    ) -> anyhow::Result<Outcome> {
        let Some(option) = parse_option(input, 2) else {
            return Ok(self.invalid_option(state, EXPERIENCE_QUESTION));
        };

        let experience = if option == 1 { "Sim" } else { "Não" };
        let next = state.advanced(Stage::AskingInterests, "experiencia_previa", experience);

        Ok(Outcome {
            reply: render_menu(&INTERESTS_MENU, state.name.as_deref()),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Experiência prévia", experience.to_string())],
            greeting_reset: false,
        })
    }

    fn handle_interests(&self, input: &str, state: &ConversationState) -> Outcome {
        let Some(option) = parse_option(input, INTEREST_LABELS.len()) else {
            return self.invalid_option(state, &render_menu(&INTERESTS_MENU, None));
        };

        let interest = INTEREST_LABELS[option - 1];
        let name = state.name.as_deref().unwrap_or("Olá");
        let next = state.advanced(Stage::PostInterests, "interesse_principal", interest);

        Outcome {
            reply: content::plan_now_question(name, interest),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Interesse principal", interest.to_string())],
            greeting_reset: false,
        }
    }

    fn handle_post_interests(&self, input: &str, state: &ConversationState) -> Outcome {
        let name = state.name.as_deref().unwrap_or("Olá").to_string();
        match parse_option(input, 2) {
            Some(1) => {
                let next = state.at_stage(Stage::AskingPeriod);
                Outcome::reply_only(render_menu(&PERIOD_MENU, Some(&name)), &next)
            }
            Some(2) => {
                let next = state.at_stage(Stage::Menu);
                Outcome::reply_only(content::just_browsing(&name), &next)
            }
            None => self.invalid_option(state, &content::plan_now_reprompt()),
            Some(_) => unreachable!("parse_option bounded to 2"),
        }
    }

    fn handle_period(&self, input: &str, state: &ConversationState) -> Outcome {
        let Some(option) = parse_option(input, PERIOD_LABELS.len()) else {
            return self.invalid_option(state, &render_menu(&PERIOD_MENU, None));
        };

        let period = PERIOD_LABELS[option - 1];
        let name = state.name.as_deref().unwrap_or("Olá");
        let next = state.advanced(Stage::AskingDuration, "periodo_viagem", period);

        Outcome {
            reply: format!("📅 Excelente, {name}! {}", render_menu(&DURATION_MENU, None)),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Período desejado", period.to_string())],
            greeting_reset: false,
        }
    }

    fn handle_duration(&self, input: &str, state: &ConversationState) -> Outcome {
        let Some(option) = parse_option(input, DURATION_LABELS.len()) else {
            return self.invalid_option(state, &render_menu(&DURATION_MENU, None));
        };

        let duration = DURATION_LABELS[option - 1];
        let name = state.name.as_deref().unwrap_or("Olá");
        let next = state.advanced(Stage::AskingDestination, "duracao", duration);

        Outcome {
            reply: format!(
                "⏱️ Perfeito, {name}! {}",
                render_menu(&DESTINATION_MENU, None)
            ),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Duração desejada", duration.to_string())],
            greeting_reset: false,
        }
    }

    fn handle_destination(&self, input: &str, state: &ConversationState) -> Outcome {
        let Some(option) = parse_option(input, DESTINATION_LABELS.len()) else {
            return self.invalid_option(state, &render_menu(&DESTINATION_MENU, None));
        };

        let destination = DESTINATION_LABELS[option - 1];
        let name = state.name.as_deref().unwrap_or("Olá");
        let next = state.advanced(Stage::AskingContactMethod, "destino", destination);

        Outcome {
            reply: format!(
                "🌎 Excelente escolha, {name}! {}",
                render_menu(&CONTACT_METHOD_MENU, None)
            ),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Destino desejado", destination.to_string())],
            greeting_reset: false,
        }
    }

    fn handle_contact_method(&self, input: &str, state: &ConversationState) -> Outcome {
        let Some(option) = parse_option(input, CONTACT_METHOD_LABELS.len()) else {
            return self.invalid_option(state, &render_menu(&CONTACT_METHOD_MENU, None));
        };

        let method = CONTACT_METHOD_LABELS[option - 1];
        let name = state.name.as_deref().unwrap_or("Olá");
        let next = state.advanced(Stage::AskingContactTime, "metodo_contato", method);

        Outcome {
            reply: format!(
                "📱 Anotado, {name}! {}",
                render_menu(&CONTACT_TIME_MENU, None)
            ),
            state: Some(next),
            classification: Classification::None,
            profile_updates: vec![("Método de contato", method.to_string())],
            greeting_reset: false,
        }
    }

    /// Last intake step. Completing it emits `IntakeComplete`, exactly once
    /// per intake, and parks the conversation in the terminal stage.
    fn handle_contact_time(&self, input: &str, state: &ConversationState) -> Outcome {
        let Some(option) = parse_option(input, CONTACT_TIME_LABELS.len()) else {
            return self.invalid_option(state, &render_menu(&CONTACT_TIME_MENU, None));
        };

        let time = CONTACT_TIME_LABELS[option - 1];
        let name = state.name.as_deref().unwrap_or("Olá");
        let method = state
            .attributes
            .get("metodo_contato")
            .map(String::as_str)
            .unwrap_or("Não especificado");

        let reply = content::intake_complete(name, method, time);
        let next = state.advanced(Stage::ServiceRequested, "horario_contato", time);

        Outcome {
            reply,
            state: Some(next),
            classification: Classification::IntakeComplete,
            profile_updates: vec![("Horário de contato", time.to_string())],
            greeting_reset: false,
        }
    }

    fn handle_terminal(
        &self,
        input: &str,
        state: &ConversationState,
        name: Option<&str>,
    ) -> Outcome {
        let name = name.unwrap_or("Olá");
        let normalized = input.trim().to_lowercase();

        if normalized == "3" || HELP_WORDS.contains(&normalized.as_str()) {
            return Outcome {
                reply: content::service_requested(name),
                state: Some(state.clone()),
                classification: Classification::Urgent,
                profile_updates: Vec::new(),
                greeting_reset: false,
            };
        }

        Outcome::reply_only(content::service_pending_ack(name), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FallbackError;
    use async_trait::async_trait;

    /// Fallback stub that either answers or fails, as configured.
    struct StubFallback {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl Fallback for StubFallback {
        async fn generate(
            &self,
            _name: Option<&str>,
            _input: &str,
            _knowledge: &[(&str, &str)],
        ) -> Result<String, FallbackError> {
            self.reply
                .map(String::from)
                .ok_or(FallbackError::NotConfigured)
        }
    }

    fn engine() -> Engine {
        Engine::with_rng_seed(Arc::new(StubFallback { reply: Some("resposta da IA") }), 7)
    }

    fn engine_without_fallback() -> Engine {
        Engine::with_rng_seed(Arc::new(StubFallback { reply: None }), 7)
    }

    async fn drive(engine: &Engine, inputs: &[&str]) -> (ConversationState, Outcome) {
        let mut state: Option<ConversationState> = None;
        let mut last = None;
        for input in inputs {
            let outcome = engine.handle(input, state.as_ref()).await;
            if let Some(ref next) = outcome.state {
                state = Some(next.clone());
            }
            last = Some(outcome);
        }
        (state.expect("state after drive"), last.expect("outcome"))
    }

    // ── Greeting ────────────────────────────────────────────────────

    #[test]
    fn greeting_matches_words_phrases_and_commands() {
        assert!(is_greeting("oi"));
        assert!(is_greeting("OLÁ"));
        assert!(is_greeting("Bom dia, tudo bem?".split(',').next().unwrap()));
        assert!(is_greeting("oi pessoal"));
        assert!(is_greeting("start"));
        assert!(!is_greeting("oie"));
        assert!(!is_greeting("quero viajar"));
        // "menu" is a navigation command, not a conversation reset
        assert!(!is_greeting("menu"));
    }

    #[tokio::test]
    async fn greeting_resets_from_any_stage_and_is_idempotent() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "2"]).await;
        assert_eq!(state.stage, Stage::AskingPeriod);

        let first = engine.handle("oi", Some(&state)).await;
        assert!(first.greeting_reset);
        let reset = first.state.unwrap();
        assert_eq!(reset.stage, Stage::AwaitingName);
        assert!(reset.name.is_none());

        let second = engine.handle("Olá", Some(&reset)).await;
        assert!(second.greeting_reset);
        assert_eq!(second.state.unwrap().stage, Stage::AwaitingName);
    }

    // ── Happy path ──────────────────────────────────────────────────

    #[tokio::test]
    async fn happy_path_walks_intake_and_records_period() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "2", "1", "6", "1"]).await;

        // oi→aguardando_nome, Ana→aguardando_email, email→menu,
        // "2"→perguntando_periodo_viagem, "1"→perguntando_duracao,
        // "6" is out of range for the 5-option duration menu (no advance),
        // "1"→perguntando_destino
        assert_eq!(state.stage, Stage::AskingDestination);
        assert_eq!(state.name.as_deref(), Some("Ana"));
        assert_eq!(state.email.as_deref(), Some("ana@x.com"));
        assert_eq!(state.attributes["periodo_viagem"], "Primeiros meses (Jan-Mar)");
        assert_eq!(state.attributes["duracao"], "Mini-cruzeiro (3-5 dias)");
        assert!(!state.attributes.contains_key("destino"));
    }

    #[tokio::test]
    async fn intake_completion_emits_intake_complete_once() {
        let engine = engine();
        let (state, outcome) = drive(
            &engine,
            &["oi", "Ana", "ana@x.com", "2", "1", "2", "1", "1", "2"],
        )
        .await;

        assert_eq!(state.stage, Stage::ServiceRequested);
        assert_eq!(outcome.classification, Classification::IntakeComplete);
        assert_eq!(state.attributes["horario_contato"], "Horário de almoço (12h-14h)");
        assert_eq!(state.attributes["metodo_contato"], "WhatsApp");
        assert!(outcome.reply.contains("WhatsApp"));

        // Terminal stage afterwards never re-emits IntakeComplete
        let after = engine.handle("obrigada", Some(&state)).await;
        assert_eq!(after.classification, Classification::None);
    }

    #[tokio::test]
    async fn spelled_out_numbers_advance_stages() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "dois", "três"]).await;
        assert_eq!(state.stage, Stage::AskingDuration);
        assert_eq!(state.attributes["periodo_viagem"], "Férias de julho");
    }

    // ── Validation failures never advance state ─────────────────────

    #[tokio::test]
    async fn invalid_option_keeps_state_and_repeats_menu() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com"]).await;
        assert_eq!(state.stage, Stage::Menu);

        for bad in ["7", "0", "99", "quero tudo"] {
            let outcome = engine.handle(bad, Some(&state)).await;
            assert_eq!(outcome.state.as_ref().unwrap().stage, Stage::Menu);
            assert_eq!(outcome.classification, Classification::None);
            assert!(outcome.reply.starts_with("Ana, "));
            assert!(
                outcome.reply.contains("Como podemos auxiliá-lo(a) hoje?"),
                "invalid reply must repeat the stage menu"
            );
        }
    }

    #[tokio::test]
    async fn invalid_option_mid_intake_repeats_stage_menu() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "2"]).await;
        assert_eq!(state.stage, Stage::AskingPeriod);

        let outcome = engine.handle("42", Some(&state)).await;
        let next = outcome.state.unwrap();
        assert_eq!(next.stage, Stage::AskingPeriod);
        assert!(next.attributes.is_empty());
        assert!(outcome.reply.contains("Qual seria o melhor período"));
    }

    #[tokio::test]
    async fn invalid_email_reprompts_without_advancing() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana"]).await;
        assert_eq!(state.stage, Stage::AwaitingEmail);

        for bad in ["a@b", "a.b.com", "@b.com"] {
            let outcome = engine.handle(bad, Some(&state)).await;
            let next = outcome.state.unwrap();
            assert_eq!(next.stage, Stage::AwaitingEmail);
            assert!(next.email.is_none());
            assert!(outcome.reply.contains("não parece válido"));
        }

        let ok = engine.handle("a@b.co", Some(&state)).await;
        assert_eq!(ok.state.unwrap().stage, Stage::Menu);
        assert_eq!(ok.profile_updates, vec![("Email", "a@b.co".to_string())]);
    }

    // ── Menu command and hub ────────────────────────────────────────

    #[tokio::test]
    async fn menu_command_jumps_to_menu_when_name_known() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "2"]).await;
        assert_eq!(state.stage, Stage::AskingPeriod);

        let outcome = engine.handle("MENU", Some(&state)).await;
        assert_eq!(outcome.state.unwrap().stage, Stage::Menu);
        assert!(outcome.reply.contains("Como podemos auxiliá-lo(a) hoje?"));
    }

    #[tokio::test]
    async fn menu_command_without_name_falls_through_to_stage() {
        let engine = engine();
        let outcome = engine
            .handle("menu", Some(&ConversationState::new()))
            .await;
        // Interpreted as the client's name, the only thing that stage wants.
        let next = outcome.state.unwrap();
        assert_eq!(next.stage, Stage::AwaitingEmail);
        assert_eq!(next.name.as_deref(), Some("menu"));
    }

    #[tokio::test]
    async fn declining_plan_returns_to_menu_hub() {
        let engine = engine();
        let (state, outcome) = drive(&engine, &["oi", "Ana", "ana@x.com", "1", "1", "3", "2"]).await;
        assert_eq!(state.stage, Stage::Menu);
        assert!(outcome.reply.contains("Sem problemas, Ana!"));
        assert_eq!(state.attributes["interesse_principal"], "Destinos exóticos");
    }

    // ── Intro branch ────────────────────────────────────────────────

    #[tokio::test]
    async fn intro_branch_collects_experience_then_interest() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "1", "2", "4", "1"]).await;
        assert_eq!(state.stage, Stage::AskingPeriod);
        assert_eq!(state.attributes["experiencia_previa"], "Não");
        assert_eq!(state.attributes["interesse_principal"], "Relaxamento");
    }

    #[tokio::test]
    async fn post_intro_invalid_repeats_experience_question() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "1"]).await;
        assert_eq!(state.stage, Stage::PostIntro);

        let outcome = engine.handle("talvez", Some(&state)).await;
        assert_eq!(outcome.state.unwrap().stage, Stage::PostIntro);
        assert!(outcome.reply.contains("experiência anterior com cruzeiros"));
    }

    // ── Terminal stage ──────────────────────────────────────────────

    #[tokio::test]
    async fn terminal_reentry_is_urgent_and_sticky() {
        let engine = engine();
        let (state, outcome) = drive(&engine, &["oi", "Ana", "ana@x.com", "3"]).await;
        assert_eq!(state.stage, Stage::ServiceRequested);
        assert_eq!(outcome.classification, Classification::Urgent);

        for trigger in ["3", "atendimento", "AJUDA", "falar"] {
            let again = engine.handle(trigger, Some(&state)).await;
            assert_eq!(again.classification, Classification::Urgent);
            assert_eq!(again.state.unwrap().stage, Stage::ServiceRequested);
        }

        let other = engine.handle("qual o valor?", Some(&state)).await;
        assert_eq!(other.classification, Classification::None);
        assert_eq!(other.state.unwrap().stage, Stage::ServiceRequested);
        assert!(other.reply.contains("já foi registrada"));
    }

    #[tokio::test]
    async fn terminal_ignores_menu_command() {
        let engine = engine();
        let (state, _) = drive(&engine, &["oi", "Ana", "ana@x.com", "3"]).await;

        let outcome = engine.handle("menu", Some(&state)).await;
        assert_eq!(outcome.state.unwrap().stage, Stage::ServiceRequested);
    }

    // ── Fallback ────────────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_sender_gets_fallback_reply_without_state() {
        let engine = engine();
        let outcome = engine.handle("quanto custa um cruzeiro?", None).await;
        assert_eq!(outcome.reply, "resposta da IA");
        assert!(outcome.state.is_none());
        assert_eq!(outcome.classification, Classification::None);
    }

    #[tokio::test]
    async fn fallback_failure_recovers_with_canned_reply() {
        let engine = engine_without_fallback();
        let outcome = engine.handle("quanto custa?", None).await;
        assert!(outcome.reply.contains("digite 'oi'"));
        assert!(outcome.state.is_none());
    }

    #[tokio::test]
    async fn seeded_rng_makes_invalid_replies_deterministic() {
        let a = engine();
        let b = engine();
        let state = {
            let (s, _) = drive(&a, &["oi", "Ana", "ana@x.com"]).await;
            s
        };
        drive(&b, &["oi", "Ana", "ana@x.com"]).await;

        let ra = a.handle("xyz", Some(&state)).await;
        let rb = b.handle("xyz", Some(&state)).await;
        assert_eq!(ra.reply, rb.reply);
    }
}
