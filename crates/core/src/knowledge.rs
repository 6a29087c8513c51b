//! Read-only knowledge base shared by the scoring engine and the router.
//!
//! Loaded once at startup (JSON file or compiled-in defaults), wrapped in an
//! `Arc`, and passed explicitly to every consumer. Nothing mutates it after
//! construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::contact::LeadStatus;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not read knowledge base `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse knowledge base: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("knowledge base is invalid: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBase {
    pub status_scores: StatusScores,
    /// Lead source name (lowercase) to quality score in `0..=100`.
    pub source_scores: BTreeMap<String, f64>,
    pub default_source_score: f64,
    pub intent_terms: IntentVocabulary,
    pub areas: Vec<String>,
    pub property_types: Vec<String>,
    pub fast_path: FastPathTable,
    pub email_templates: Vec<EmailTemplate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusScores {
    pub hot: f64,
    pub warm: f64,
    pub cold: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentVocabulary {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub negative: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastPathTable {
    /// Thanks and acknowledgements, answered with `acknowledgement`.
    pub fillers: Vec<String>,
    pub acknowledgement: String,
    /// Salutations, answered with `greeting_reply`.
    pub greetings: Vec<String>,
    pub greeting_reply: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    /// Tera template body. Variables: `name`, `property`, `status`.
    pub body: String,
}

impl Default for StatusScores {
    fn default() -> Self {
        Self { hot: 100.0, warm: 60.0, cold: 20.0 }
    }
}

impl Default for FastPathTable {
    fn default() -> Self {
        Self {
            fillers: strings(&[
                "thanks",
                "thank you",
                "thanks a lot",
                "thx",
                "ok",
                "okay",
                "ok thanks",
                "got it",
                "great",
                "cool",
                "perfect",
                "noted",
                "sounds good",
            ]),
            acknowledgement: "You're welcome! Let me know if you need anything else.".to_string(),
            greetings: strings(&[
                "hi",
                "hello",
                "hey",
                "hi there",
                "hello there",
                "good morning",
                "good afternoon",
                "good evening",
            ]),
            greeting_reply: "Hello! How can I help with your properties, contacts or deals today?"
                .to_string(),
        }
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        let source_scores = [
            ("referral", 90.0),
            ("previous client", 85.0),
            ("social media", 70.0),
            ("website", 60.0),
            ("walk-in", 50.0),
            ("cold call", 30.0),
        ]
        .into_iter()
        .map(|(name, score)| (name.to_string(), score))
        .collect();

        Self {
            status_scores: StatusScores::default(),
            source_scores,
            default_source_score: 40.0,
            intent_terms: IntentVocabulary {
                high: strings(&[
                    "urgent",
                    "asap",
                    "ready to buy",
                    "cash buyer",
                    "pre-approved",
                    "mortgage approved",
                ]),
                medium: strings(&["interested", "looking for", "budget", "timeline", "viewing"]),
                negative: strings(&["not interested", "postpone", "delay", "maybe later"]),
            },
            areas: strings(&[
                "palm jumeirah",
                "downtown",
                "dubai marina",
                "marina",
                "jbr",
                "business bay",
                "difc",
                "deira",
                "jumeirah",
                "dubai hills",
                "arabian ranches",
                "jvc",
                "al barsha",
            ]),
            property_types: strings(&[
                "apartment",
                "villa",
                "townhouse",
                "penthouse",
                "studio",
                "duplex",
                "office",
            ]),
            fast_path: FastPathTable::default(),
            email_templates: vec![
                EmailTemplate {
                    name: "follow_up_hot".to_string(),
                    subject: "Quick follow-up on {{ property }}".to_string(),
                    body: "Hi {{ name }},\n\nI wanted to follow up on your interest in {{ property }}. \
Do you have any questions, or would you like to schedule a viewing this week?\n\nBest regards,\nYour Real Estate Agent"
                        .to_string(),
                },
                EmailTemplate {
                    name: "welcome_new_lead".to_string(),
                    subject: "Welcome, {{ name }}".to_string(),
                    body: "Dear {{ name }},\n\nThank you for your interest in Dubai real estate. \
I look forward to helping you find the right property.\n\nBest regards,\nYour Real Estate Agent"
                        .to_string(),
                },
                EmailTemplate {
                    name: "viewing_confirmation".to_string(),
                    subject: "Your viewing at {{ property }}".to_string(),
                    body: "Hi {{ name }},\n\nThis confirms your viewing for {{ property }}. \
Reply to this email if you need to change the time.\n\nSee you there!\nYour Real Estate Agent"
                        .to_string(),
                },
                EmailTemplate {
                    name: "follow_up_general".to_string(),
                    subject: "Checking in".to_string(),
                    body: "Hi {{ name }},\n\nJust checking in regarding {{ property }}. \
The market is moving and I'd be glad to share new options that fit what you're after.\n\nBest regards,\nYour Real Estate Agent"
                        .to_string(),
                },
            ],
        }
    }
}

impl KnowledgeBase {
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| KnowledgeError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, KnowledgeError> {
        let mut knowledge: Self = serde_json::from_str(raw)?;
        knowledge.normalize();
        knowledge.validate()?;
        Ok(knowledge)
    }

    /// Loads from `path` when given, otherwise returns the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, KnowledgeError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn status_score(&self, status: LeadStatus) -> f64 {
        match status {
            LeadStatus::Hot => self.status_scores.hot,
            LeadStatus::Warm => self.status_scores.warm,
            LeadStatus::Cold => self.status_scores.cold,
        }
    }

    /// Source quality in `0..=100`. Unknown or missing sources get the default.
    pub fn source_score(&self, source: Option<&str>) -> f64 {
        source
            .map(|value| value.trim().to_lowercase())
            .and_then(|key| self.source_scores.get(&key).copied())
            .unwrap_or(self.default_source_score)
    }

    pub fn template(&self, name: &str) -> Option<&EmailTemplate> {
        self.email_templates.iter().find(|template| template.name == name)
    }

    fn normalize(&mut self) {
        self.source_scores = std::mem::take(&mut self.source_scores)
            .into_iter()
            .map(|(name, score)| (name.trim().to_lowercase(), score))
            .collect();
        for list in [
            &mut self.intent_terms.high,
            &mut self.intent_terms.medium,
            &mut self.intent_terms.negative,
            &mut self.areas,
            &mut self.property_types,
            &mut self.fast_path.fillers,
            &mut self.fast_path.greetings,
        ] {
            for entry in list.iter_mut() {
                *entry = entry.trim().to_lowercase();
            }
            list.retain(|entry| !entry.is_empty());
        }
    }

    fn validate(&self) -> Result<(), KnowledgeError> {
        let scores = [self.status_scores.hot, self.status_scores.warm, self.status_scores.cold];
        let in_range = |value: f64| value.is_finite() && (0.0..=100.0).contains(&value);
        if !scores.iter().all(|score| in_range(*score)) {
            return Err(KnowledgeError::Invalid(
                "status_scores must be within 0..=100".to_string(),
            ));
        }
        if !in_range(self.default_source_score)
            || !self.source_scores.values().all(|score| in_range(*score))
        {
            return Err(KnowledgeError::Invalid(
                "source scores must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
