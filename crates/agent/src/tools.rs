use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use aura_core::errors::DomainError;
use aura_core::knowledge::KnowledgeBase;
use aura_core::scoring::FollowUpPolicy;
use aura_core::store::{CrmStore, StoreError};

use crate::handlers;
use crate::intent::Intent;

/// Everything a handler may touch for one request.
#[derive(Clone)]
pub struct ToolContext {
    pub store: Arc<dyn CrmStore>,
    pub knowledge: Arc<KnowledgeBase>,
    pub follow_up_policy: FollowUpPolicy,
    pub now: DateTime<Utc>,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Answer { text: String, data: Value },
    /// A mention could not be resolved to exactly one record.
    Clarify { question: String },
}

impl ToolOutcome {
    pub fn answer(text: impl Into<String>, data: Value) -> Self {
        Self::Answer { text: text.into(), data }
    }

    pub fn clarify(question: impl Into<String>) -> Self {
        Self::Clarify { question: question.into() }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("could not serialize tool output: {0}")]
    Output(#[from] serde_json::Error),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn intent(&self) -> Intent;
    async fn execute(&self, entities: &[String], ctx: &ToolContext)
        -> Result<ToolOutcome, ToolError>;
}

pub enum Dispatch<'a> {
    Handler(&'a dyn Tool),
    Unknown,
}

/// Intent to handler table, built once and shared read-only.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<Intent, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One handler per actionable intent.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for intent in Intent::ACTIONABLE {
            if let Some(tool) = standard_handler(intent) {
                registry.tools.insert(intent, tool);
            }
        }
        registry
    }

    /// Installs `tool` for its intent, replacing any existing handler.
    /// Tools claiming `Intent::Unknown` are ignored.
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let intent = tool.intent();
        if intent != Intent::Unknown {
            self.tools.insert(intent, Arc::new(tool));
        }
    }

    pub fn lookup(&self, intent: Intent) -> Dispatch<'_> {
        match self.tools.get(&intent) {
            Some(tool) => Dispatch::Handler(tool.as_ref()),
            None => Dispatch::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn standard_handler(intent: Intent) -> Option<Arc<dyn Tool>> {
    let tool: Arc<dyn Tool> = match intent {
        Intent::FindOwner => Arc::new(handlers::owner::FindOwner),
        Intent::CreateTask => Arc::new(handlers::tasks::CreateTask),
        Intent::ScheduleViewing => Arc::new(handlers::viewings::ScheduleViewing),
        Intent::OverdueTasks => Arc::new(handlers::tasks::OverdueTasks),
        Intent::FollowUps => Arc::new(handlers::leads::FollowUps),
        Intent::LeadScores => Arc::new(handlers::leads::LeadScores),
        Intent::FindBuyers => Arc::new(handlers::properties::FindBuyers),
        Intent::SearchProperties => Arc::new(handlers::properties::SearchProperties),
        Intent::DealProbability => Arc::new(handlers::deals::DealProbability),
        Intent::MarketInsights => Arc::new(handlers::reports::MarketInsights),
        Intent::Performance => Arc::new(handlers::reports::Performance),
        Intent::DailyBriefing => Arc::new(handlers::reports::DailyBriefing),
        Intent::DraftEmail => Arc::new(handlers::email::DraftEmail),
        Intent::Unknown => return None,
    };
    Some(tool)
}
