//! Ports to the hosted language model plus the reqwest-backed client.
//!
//! The router only sees [`IntentClassifier`] and [`TextGenerator`]. Every
//! failure is an explicit [`LlmError`]; nothing here falls back to a
//! default intent on its own.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use aura_core::config::{LlmConfig, LlmProvider};

use crate::conversation::{render_transcript, Turn};
use crate::intent::{Classification, Intent};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

const ASSISTANT_PERSONA: &str = "You are AURA, an assistant for a Dubai real estate professional. \
Use the CRM data provided to give concise, specific and professional answers. If you need data \
that was not provided, say what the user should supply.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured: {0}")]
    NotConfigured(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed language model reply: {0}")]
    Malformed(String),
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured(_) | Self::Malformed(_) => false,
        }
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, utterance: &str, history: &[Turn])
        -> Result<Classification, LlmError>;
}

/// `crm_context` is a rendered portfolio summary, or a note that it could
/// not be read.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        utterance: &str,
        history: &[Turn],
        crm_context: &str,
    ) -> Result<String, LlmError>;
}

/// Generator used by the offline provider. It always reports that
/// generation is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate(
        &self,
        _utterance: &str,
        _history: &[Turn],
        _crm_context: &str,
    ) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured("offline provider has no text generation".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

/// Classifier and generator backed by Gemini `generateContent` or an
/// OpenAI-compatible chat-completions endpoint (OpenAI, Ollama).
pub struct HttpLlmClient {
    provider: LlmProvider,
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    timeout: Duration,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let default_base = match config.provider {
            LlmProvider::Offline => {
                return Err(LlmError::NotConfigured("provider is offline".to_string()))
            }
            LlmProvider::Gemini => GEMINI_BASE_URL,
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Ollama => OLLAMA_BASE_URL,
        };
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(LlmError::NotConfigured(format!(
                "provider `{}` requires llm.api_key",
                config.provider.as_str()
            )));
        }

        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            provider: config.provider,
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout,
            max_retries: config.max_retries,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            let outcome = match self.provider {
                LlmProvider::Gemini => self.complete_gemini(system, prompt).await,
                _ => self.complete_chat(system, prompt).await,
            };
            match outcome {
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        provider = self.provider.as_str(),
                        attempt,
                        error = %error,
                        "retrying language model call"
                    );
                }
                other => return other,
            }
        }
    }

    async fn complete_chat(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system.to_string() },
                ChatMessage { role: "user".to_string(), content: prompt.to_string() },
            ],
            temperature: Some(0.2),
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().await.map_err(|error| self.transport_error(error))?;
        let response = check_status(response).await?;
        let parsed: ChatResponse =
            response.json().await.map_err(|error| LlmError::Malformed(error.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::Malformed("reply had no message content".to_string()))
    }

    async fn complete_gemini(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key.expose_secret());
        }
        let response = request.send().await.map_err(|error| self.transport_error(error))?;
        let response = check_status(response).await?;
        let parsed: GeminiResponse =
            response.json().await.map_err(|error| LlmError::Malformed(error.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            return Err(LlmError::Malformed("reply had no candidate text".to_string()));
        }
        Ok(text)
    }

    fn transport_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Transport(error.to_string())
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Status { status: status.as_u16(), body: body.chars().take(512).collect() })
}

fn classification_prompt(utterance: &str, history: &[Turn]) -> String {
    let intents = Intent::ACTIONABLE.iter().map(Intent::as_str).collect::<Vec<_>>().join(", ");
    let transcript = if history.is_empty() {
        "(none)".to_string()
    } else {
        render_transcript(history)
    };
    format!(
        "Classify the user's latest message for a real estate CRM assistant.\n\
         Allowed intents: {intents}, unknown.\n\
         Use `unknown` for anything that is not a request to run one of those operations.\n\
         Extract entities as short strings naming properties (building and unit), contacts, \
         areas or dates.\n\
         Reply with JSON only: {{\"intent\": \"<intent>\", \"entities\": [\"...\"]}}\n\n\
         Conversation so far:\n{transcript}\n\nLatest message: {utterance}"
    )
}

fn generation_prompt(utterance: &str, history: &[Turn], crm_context: &str) -> String {
    let mut prompt = format!("CRM data:\n{}\n\n", crm_context.trim_end());
    if !history.is_empty() {
        prompt.push_str(&format!("Conversation so far:\n{}\n\n", render_transcript(history)));
    }
    prompt.push_str(&format!("User query: {utterance}"));
    prompt
}

/// Reads `{"intent": ..., "entities": [...]}` out of a model reply, tolerating
/// code fences and prose around the object.
pub fn parse_classification(raw: &str) -> Result<Classification, LlmError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let object = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => return Err(LlmError::Malformed("no JSON object in classifier reply".to_string())),
    };
    let value: Value =
        serde_json::from_str(object).map_err(|error| LlmError::Malformed(error.to_string()))?;

    let intent = value
        .get("intent")
        .and_then(Value::as_str)
        .map(Intent::from_token)
        .ok_or_else(|| LlmError::Malformed("classifier reply has no `intent`".to_string()))?;
    let entities = value
        .get("entities")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|entity| !entity.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Classification::new(intent, entities))
}

#[async_trait]
impl IntentClassifier for HttpLlmClient {
    async fn classify(
        &self,
        utterance: &str,
        history: &[Turn],
    ) -> Result<Classification, LlmError> {
        let raw = self
            .complete("You map messages to CRM intents.", &classification_prompt(utterance, history))
            .await?;
        let classification = parse_classification(&raw)?;
        debug!(
            event_name = "agent.llm.classified",
            provider = self.provider.as_str(),
            intent = classification.intent.as_str(),
            entities = classification.entities.len(),
            "classifier reply parsed"
        );
        Ok(classification)
    }
}

#[async_trait]
impl TextGenerator for HttpLlmClient {
    async fn generate(
        &self,
        utterance: &str,
        history: &[Turn],
        crm_context: &str,
    ) -> Result<String, LlmError> {
        self.complete(ASSISTANT_PERSONA, &generation_prompt(utterance, history, crm_context)).await
    }
}

#[cfg(test)]
mod tests {
    use aura_core::config::{LlmConfig, LlmProvider};

    use super::{generation_prompt, parse_classification, HttpLlmClient, LlmError};
    use crate::conversation::{Role, Turn};
    use crate::intent::Intent;

    fn llm_config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: None,
            base_url: None,
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 5,
            max_retries: 0,
        }
    }

    #[test]
    fn generation_prompt_leads_with_crm_data_then_conversation() {
        let history = vec![Turn { role: Role::User, text: "hello".to_string() }];
        let prompt = generation_prompt(
            "Which area should I focus on?",
            &history,
            "Database Summary:\n- Total Properties: 3\n",
        );
        assert!(prompt.starts_with("CRM data:\nDatabase Summary:\n- Total Properties: 3\n\n"));
        assert!(prompt.contains("Conversation so far:\n"));
        assert!(prompt.ends_with("User query: Which area should I focus on?"));

        let bare = generation_prompt("hi there", &[], "Database context unavailable.");
        assert_eq!(bare, "CRM data:\nDatabase context unavailable.\n\nUser query: hi there");
    }

    #[test]
    fn parse_classification_tolerates_code_fences() {
        let raw = "```json\n{\"intent\": \"find_owner\", \"entities\": [\"Palm Tower 3401\", \"\"]}\n```";
        let parsed = parse_classification(raw).expect("parse");
        assert_eq!(parsed.intent, Intent::FindOwner);
        assert_eq!(parsed.entities, vec!["Palm Tower 3401".to_string()]);
    }

    #[test]
    fn parse_classification_maps_unlisted_tokens_to_unknown() {
        let parsed = parse_classification(r#"{"intent": "book_flight"}"#).expect("parse");
        assert_eq!(parsed.intent, Intent::Unknown);
        assert!(parsed.entities.is_empty());
    }

    #[test]
    fn parse_classification_rejects_prose() {
        assert!(matches!(
            parse_classification("I think they want the owner"),
            Err(LlmError::Malformed(_))
        ));
        assert!(matches!(parse_classification(r#"{"entities": []}"#), Err(LlmError::Malformed(_))));
    }

    #[test]
    fn hosted_providers_require_an_api_key() {
        assert!(matches!(
            HttpLlmClient::from_config(&llm_config(LlmProvider::Gemini)),
            Err(LlmError::NotConfigured(_))
        ));
        assert!(matches!(
            HttpLlmClient::from_config(&llm_config(LlmProvider::Offline)),
            Err(LlmError::NotConfigured(_))
        ));
        let ollama = HttpLlmClient::from_config(&llm_config(LlmProvider::Ollama)).expect("ollama");
        assert_eq!(ollama.provider(), LlmProvider::Ollama);
    }
}
