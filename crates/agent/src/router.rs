//! Cognitive router: picks the cheapest tier that can answer.
//!
//! Tier 0 answers conversational filler from a static table. Tier 1
//! classifies the utterance into an [`Intent`]. Tier 2 runs the registered
//! handler against fresh CRM data. Tier 3 hands the verbatim utterance and a
//! portfolio summary to the text generator when no handler applies or
//! classification failed.
//! Every failure ends in a degraded [`Reply`], never an error or a panic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use aura_core::config::{AppConfig, LlmProvider, RouterConfig};
use aura_core::knowledge::KnowledgeBase;
use aura_core::scoring::FollowUpPolicy;
use aura_core::store::CrmStore;

use crate::classifier::KeywordClassifier;
use crate::conversation::{ConversationHistory, Turn};
use crate::fast_path::FastPath;
use crate::intent::{Classification, Intent};
use crate::llm::{HttpLlmClient, IntentClassifier, LlmError, OfflineGenerator, TextGenerator};
use crate::tools::{Dispatch, Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry};
use crate::workflows;

pub const GENERATION_UNAVAILABLE_TEXT: &str =
    "I couldn't process that request right now. Please try again.";
pub const DATA_UNAVAILABLE_TEXT: &str = "I couldn't reach the CRM data just now. Please try again.";
pub const TOOL_FAILED_TEXT: &str = "I couldn't complete that request. Please try rephrasing it.";
/// Sent to the generator in place of the portfolio summary when storage fails.
pub const CRM_CONTEXT_UNAVAILABLE_TEXT: &str = "Database context unavailable.";
const EMPTY_UTTERANCE_TEXT: &str = "What can I help you with? You can ask about owners, \
follow-ups, lead scores, buyers, listings, deals or your daily briefing.";

/// Tier that produced the reply. Classification alone never replies, so it
/// has no variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    FastPath,
    ToolDispatch,
    Generation,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastPath => "fast_path",
            Self::ToolDispatch => "tool_dispatch",
            Self::Generation => "generation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Answered,
    /// The reply is a question back to the user.
    Clarification,
    /// Classification failed; the text came from the generator.
    ClassificationUnavailable,
    GenerationUnavailable,
    /// A handler could not read or write CRM data.
    DataUnavailable,
    /// A handler failed on its own logic or output.
    ToolFailed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub text: String,
    pub source_tier: Tier,
    pub tool_used: Option<Intent>,
    pub status: ReplyStatus,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Reply {
    fn new(text: impl Into<String>, tier: Tier, status: ReplyStatus, correlation_id: &str) -> Self {
        Self {
            text: text.into(),
            source_tier: tier,
            tool_used: None,
            status,
            correlation_id: correlation_id.to_string(),
            data: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self.status,
            ReplyStatus::ClassificationUnavailable
                | ReplyStatus::GenerationUnavailable
                | ReplyStatus::DataUnavailable
                | ReplyStatus::ToolFailed
        )
    }
}

pub struct CognitiveRouter {
    store: Arc<dyn CrmStore>,
    knowledge: Arc<KnowledgeBase>,
    classifier: Arc<dyn IntentClassifier>,
    generator: Arc<dyn TextGenerator>,
    registry: ToolRegistry,
    fast_path: FastPath,
    settings: RouterConfig,
    follow_up_policy: FollowUpPolicy,
}

impl CognitiveRouter {
    pub fn new(
        store: Arc<dyn CrmStore>,
        knowledge: Arc<KnowledgeBase>,
        classifier: Arc<dyn IntentClassifier>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let fast_path = FastPath::new(&knowledge.fast_path);
        Self {
            store,
            knowledge,
            classifier,
            generator,
            registry: ToolRegistry::standard(),
            fast_path,
            settings: AppConfig::default().router,
            follow_up_policy: FollowUpPolicy::default(),
        }
    }

    /// Keyword classification and no text generation.
    pub fn offline(store: Arc<dyn CrmStore>, knowledge: Arc<KnowledgeBase>) -> Self {
        Self::new(store, knowledge, Arc::new(KeywordClassifier::new()), Arc::new(OfflineGenerator))
    }

    /// Builds the router for the configured provider. A provider that cannot
    /// be set up (missing key, bad client) degrades to the offline router.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn CrmStore>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        let router = match config.llm.provider {
            LlmProvider::Offline => Self::offline(store, knowledge),
            provider => match HttpLlmClient::from_config(&config.llm) {
                Ok(client) => {
                    let client = Arc::new(client);
                    Self::new(store, knowledge, client.clone(), client)
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.router.llm_unavailable",
                        provider = provider.as_str(),
                        error = %error,
                        "language model unavailable, using the offline router"
                    );
                    Self::offline(store, knowledge)
                }
            },
        };
        router.with_settings(config.router.clone()).with_policy(config.scoring.follow_up_policy())
    }

    pub fn with_settings(mut self, settings: RouterConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy(mut self, policy: FollowUpPolicy) -> Self {
        self.follow_up_policy = policy;
        self
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub async fn route(&self, utterance: &str, history: &ConversationHistory) -> Reply {
        self.route_at(utterance, history, Utc::now()).await
    }

    /// [`Self::route`] with an explicit clock for handlers.
    pub async fn route_at(
        &self,
        utterance: &str,
        history: &ConversationHistory,
        now: DateTime<Utc>,
    ) -> Reply {
        let correlation_id = Uuid::new_v4().to_string();

        if utterance.trim().is_empty() {
            return self.selected(Reply::new(
                EMPTY_UTTERANCE_TEXT,
                Tier::FastPath,
                ReplyStatus::Clarification,
                &correlation_id,
            ));
        }

        if self.settings.fast_path_enabled {
            if let Some(text) = self.fast_path.respond(utterance) {
                return self.selected(Reply::new(
                    text,
                    Tier::FastPath,
                    ReplyStatus::Answered,
                    &correlation_id,
                ));
            }
        }

        let window = history.recent(self.settings.history_window);
        let classified = bounded(
            self.settings.classify_timeout(),
            self.classifier.classify(utterance, window),
        )
        .await;

        let reply = match classified {
            Ok(Classification { intent: Intent::Unknown, .. }) => {
                self.generate(utterance, window, ReplyStatus::Answered, &correlation_id).await
            }
            Ok(classification) => match self.registry.lookup(classification.intent) {
                Dispatch::Handler(tool) => {
                    self.dispatch(tool, classification, &correlation_id, now).await
                }
                Dispatch::Unknown => {
                    self.generate(utterance, window, ReplyStatus::Answered, &correlation_id).await
                }
            },
            Err(error) => {
                warn!(
                    event_name = "agent.router.classification_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "classification failed, escalating to generation"
                );
                self.generate(
                    utterance,
                    window,
                    ReplyStatus::ClassificationUnavailable,
                    &correlation_id,
                )
                .await
            }
        };
        self.selected(reply)
    }

    async fn dispatch(
        &self,
        tool: &dyn Tool,
        classification: Classification,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Reply {
        let intent = classification.intent;
        let context = ToolContext {
            store: self.store.clone(),
            knowledge: self.knowledge.clone(),
            follow_up_policy: self.follow_up_policy,
            now,
            correlation_id: correlation_id.to_string(),
        };

        let mut reply = match tool.execute(&classification.entities, &context).await {
            Ok(ToolOutcome::Answer { text, data }) => {
                let mut reply =
                    Reply::new(text, Tier::ToolDispatch, ReplyStatus::Answered, correlation_id);
                reply.data = Some(data);
                reply
            }
            Ok(ToolOutcome::Clarify { question }) => {
                Reply::new(question, Tier::ToolDispatch, ReplyStatus::Clarification, correlation_id)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.router.handler_failed",
                    correlation_id = %correlation_id,
                    intent = intent.as_str(),
                    error = %error,
                    "handler failed"
                );
                let (text, status) = match error {
                    ToolError::Store(_) => (DATA_UNAVAILABLE_TEXT, ReplyStatus::DataUnavailable),
                    ToolError::Domain(_) | ToolError::Output(_) => {
                        (TOOL_FAILED_TEXT, ReplyStatus::ToolFailed)
                    }
                };
                Reply::new(text, Tier::ToolDispatch, status, correlation_id)
            }
        };
        reply.tool_used = Some(intent);
        reply
    }

    async fn generate(
        &self,
        utterance: &str,
        window: &[Turn],
        success: ReplyStatus,
        correlation_id: &str,
    ) -> Reply {
        let crm_context = self.crm_context(correlation_id).await;
        let generated = bounded(
            self.settings.generate_timeout(),
            self.generator.generate(utterance, window, &crm_context),
        )
        .await;
        match generated {
            Ok(text) => Reply::new(text, Tier::Generation, success, correlation_id),
            Err(error) => {
                warn!(
                    event_name = "agent.router.generation_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "generation failed"
                );
                Reply::new(
                    GENERATION_UNAVAILABLE_TEXT,
                    Tier::Generation,
                    ReplyStatus::GenerationUnavailable,
                    correlation_id,
                )
            }
        }
    }

    async fn crm_context(&self, correlation_id: &str) -> String {
        match workflows::snapshot(self.store.as_ref()).await {
            Ok(snapshot) => snapshot.render(),
            Err(error) => {
                warn!(
                    event_name = "agent.router.crm_context_unavailable",
                    correlation_id = %correlation_id,
                    error = %error,
                    "generating without CRM context"
                );
                CRM_CONTEXT_UNAVAILABLE_TEXT.to_string()
            }
        }
    }

    fn selected(&self, reply: Reply) -> Reply {
        info!(
            event_name = "agent.router.tier_selected",
            correlation_id = %reply.correlation_id,
            tier = reply.source_tier.as_str(),
            tool = reply.tool_used.map(|intent| intent.as_str()).unwrap_or("none"),
            status = ?reply.status,
            "routed utterance"
        );
        reply
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, LlmError>>,
) -> Result<T, LlmError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(limit)),
    }
}
