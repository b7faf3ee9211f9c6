//! Generative fallback — answers free-form questions the state machine has
//! no stage for.
//!
//! Treated as an opaque capability: `(name, free text, knowledge corpus) →
//! text`. The production implementation calls the OpenAI chat-completions
//! API over reqwest; tests and keyless deployments use [`NoFallback`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::FallbackError;

/// Request timeout for the fallback call. Failures are recoverable and never
/// retried within the same turn.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(8);

const DEFAULT_MODEL: &str = "gpt-4o";

/// The generative-fallback capability.
#[async_trait]
pub trait Fallback: Send + Sync {
    /// Generate a short personalized answer grounded in the knowledge base.
    async fn generate(
        &self,
        name: Option<&str>,
        input: &str,
        knowledge: &[(&str, &str)],
    ) -> Result<String, FallbackError>;
}

/// OpenAI-backed fallback.
pub struct OpenAiFallback {
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl OpenAiFallback {
    pub fn new(api_key: SecretString, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: reqwest::Client::builder()
                .timeout(FALLBACK_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn build_prompt(name: Option<&str>, input: &str, knowledge: &[(&str, &str)]) -> String {
        let context: String = knowledge
            .iter()
            .map(|(topic, text)| format!("### {topic}\n{text}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Você é um assistente da agência Travessia dos Sonhos, especializada em cruzeiros marítimos.\n\
             Nome do cliente: {}\n\
             Pergunta: \"{input}\"\n\
             Base de conhecimento:\n{context}\n\n\
             Regras importantes:\n\
             1. Responda de forma concisa e amigável (máximo 3 frases)\n\
             2. NÃO mencione nenhuma companhia de cruzeiros específica (como MSC, Royal Caribbean, etc)\n\
             3. Sempre fale de forma genérica sobre \"cruzeiros marítimos\" ou \"viagens marítimas\"\n\
             4. Se a pergunta não estiver clara, peça gentilmente ao cliente para reformular\n\
             5. Mantenha o tom cordial mas OBJETIVO e BREVE\n\
             6. Use emojis para tornar a resposta mais amigável e visual",
            name.unwrap_or("Desconhecido"),
        )
    }
}

#[async_trait]
impl Fallback for OpenAiFallback {
    async fn generate(
        &self,
        name: Option<&str>,
        input: &str,
        knowledge: &[(&str, &str)],
    ) -> Result<String, FallbackError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": Self::build_prompt(name, input, knowledge)}],
            "temperature": 0.5,
            "max_tokens": 100,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| FallbackError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(FallbackError::RequestFailed(format!(
                "chat completion returned {status}: {detail}"
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FallbackError::InvalidResponse(e.to_string()))?;

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                FallbackError::InvalidResponse("no message content in completion".into())
            })
    }
}

/// Fallback for deployments without an API key: always reports itself
/// unavailable, so the engine answers with its canned recovery reply.
pub struct NoFallback;

#[async_trait]
impl Fallback for NoFallback {
    async fn generate(
        &self,
        _name: Option<&str>,
        _input: &str,
        _knowledge: &[(&str, &str)],
    ) -> Result<String, FallbackError> {
        Err(FallbackError::NotConfigured)
    }
}
