//! Lead scoring: a weighted 0-100 rating of how ready a contact is to transact.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{days_between, recency_score, FactorContribution, RECENCY_UNKNOWN_SCORE};
use crate::domain::contact::{Contact, ContactId, LeadStatus};
use crate::domain::lead_score::LeadScore;
use crate::domain::relationship::ContactProperty;
use crate::domain::task::Task;
use crate::errors::DomainError;
use crate::knowledge::KnowledgeBase;

/// Engagement used when the caller has no interaction data for a contact.
pub const ENGAGEMENT_UNKNOWN_SCORE: f64 = 30.0;
/// Intent signal used when a contact has no notes.
pub const INTENT_NO_NOTES_SCORE: f64 = 30.0;

const INTENT_BASELINE: f64 = 50.0;
const INTENT_MEDIUM_STEP: f64 = 10.0;
const INTENT_NEGATIVE_STEP: f64 = 15.0;
const POINTS_PER_INTEREST: u32 = 30;
const POINTS_PER_TASK: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadWeights {
    pub status: f64,
    pub source: f64,
    pub recency: f64,
    pub engagement: f64,
    pub intent: f64,
}

pub const DEFAULT_LEAD_WEIGHTS: LeadWeights =
    LeadWeights { status: 0.40, source: 0.15, recency: 0.20, engagement: 0.15, intent: 0.10 };

impl Default for LeadWeights {
    fn default() -> Self {
        DEFAULT_LEAD_WEIGHTS
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadFactor {
    Status,
    Source,
    Recency,
    Engagement,
    Intent,
}

impl LeadFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Source => "source",
            Self::Recency => "recency",
            Self::Engagement => "engagement",
            Self::Intent => "intent",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl PriorityLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=100 => Self::High,
            60..=79 => Self::Medium,
            40..=59 => Self::Low,
            _ => Self::VeryLow,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        }
    }
}

/// Interaction counts feeding the engagement factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub property_interests: u32,
    pub tasks: u32,
}

impl Engagement {
    pub fn score(&self) -> f64 {
        let points = self
            .property_interests
            .saturating_mul(POINTS_PER_INTEREST)
            .saturating_add(self.tasks.saturating_mul(POINTS_PER_TASK));
        f64::from(points.min(100))
    }
}

/// Builds engagement counts for every contact in `contacts`, zero when a
/// contact has no links or tasks.
pub fn engagement_index(
    contacts: &[Contact],
    relationships: &[ContactProperty],
    tasks: &[Task],
) -> HashMap<ContactId, Engagement> {
    let mut index: HashMap<ContactId, Engagement> =
        contacts.iter().map(|contact| (contact.id, Engagement::default())).collect();

    for link in relationships.iter().filter(|link| link.relationship.shows_interest()) {
        if let Some(entry) = index.get_mut(&link.contact_id) {
            entry.property_interests += 1;
        }
    }
    for task in tasks {
        if let Some(entry) = task.contact_id.and_then(|id| index.get_mut(&id)) {
            entry.tasks += 1;
        }
    }
    index
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeadScoreResult {
    pub contact_id: ContactId,
    pub contact_name: String,
    pub lead_status: LeadStatus,
    pub last_contacted_date: Option<DateTime<Utc>>,
    pub score: u8,
    pub factors: Vec<FactorContribution<LeadFactor>>,
    pub priority: PriorityLevel,
    pub recommendations: Vec<String>,
    /// Fields that were missing and replaced by their documented default.
    pub defaults_applied: Vec<&'static str>,
}

impl LeadScoreResult {
    pub fn factor(&self, factor: LeadFactor) -> Option<&FactorContribution<LeadFactor>> {
        self.factors.iter().find(|entry| entry.factor == factor)
    }

    /// Factor name to weighted contribution, rounded to two decimals.
    pub fn factor_map(&self) -> BTreeMap<String, f64> {
        self.factors
            .iter()
            .map(|entry| {
                (entry.factor.as_str().to_string(), (entry.contribution * 100.0).round() / 100.0)
            })
            .collect()
    }

    pub fn to_record(&self, calculated_at: DateTime<Utc>) -> LeadScore {
        LeadScore {
            contact_id: self.contact_id,
            score: self.score,
            score_factors: self.factor_map(),
            last_calculated: calculated_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LeadScorer<'a> {
    knowledge: &'a KnowledgeBase,
    weights: LeadWeights,
}

impl<'a> LeadScorer<'a> {
    pub fn new(knowledge: &'a KnowledgeBase) -> Self {
        Self { knowledge, weights: LeadWeights::default() }
    }

    pub fn with_weights(knowledge: &'a KnowledgeBase, weights: LeadWeights) -> Self {
        Self { knowledge, weights }
    }

    /// Scores one contact. Missing fields fall back to documented defaults;
    /// this never fails.
    pub fn score(
        &self,
        contact: &Contact,
        engagement: Option<Engagement>,
        now: DateTime<Utc>,
    ) -> LeadScoreResult {
        let mut defaults_applied = Vec::new();

        if contact.lead_status.is_none() {
            let issue = DomainError::InvalidScoringInput {
                record: format!("contact {}", contact.id),
                field: "lead_status",
            };
            warn!(
                event_name = "core.scoring.lead.default_applied",
                contact_id = contact.id.0,
                error = %issue,
                "lead status missing, scoring as Cold"
            );
            defaults_applied.push("lead_status");
        }
        let status = contact.effective_status();

        if contact.source.as_deref().map(str::trim).map(str::is_empty).unwrap_or(true) {
            defaults_applied.push("source");
        }
        let source = self.knowledge.source_score(contact.source.as_deref());

        let recency = match contact.last_contacted_date {
            Some(at) => recency_score(days_between(at, now)),
            None => {
                defaults_applied.push("last_contacted_date");
                RECENCY_UNKNOWN_SCORE
            }
        };

        let engagement = match engagement {
            Some(counts) => counts.score(),
            None => {
                defaults_applied.push("engagement");
                ENGAGEMENT_UNKNOWN_SCORE
            }
        };

        let intent = match contact.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
            Some(notes) => intent_signal(notes, self.knowledge),
            None => {
                defaults_applied.push("notes");
                INTENT_NO_NOTES_SCORE
            }
        };

        let factors = vec![
            FactorContribution::new(
                LeadFactor::Status,
                self.knowledge.status_score(status),
                self.weights.status,
            ),
            FactorContribution::new(LeadFactor::Source, source, self.weights.source),
            FactorContribution::new(LeadFactor::Recency, recency, self.weights.recency),
            FactorContribution::new(LeadFactor::Engagement, engagement, self.weights.engagement),
            FactorContribution::new(LeadFactor::Intent, intent, self.weights.intent),
        ];

        let total: f64 = factors.iter().map(|factor| factor.contribution).sum();
        let score = total.round().clamp(0.0, 100.0) as u8;
        let priority = PriorityLevel::from_score(score);
        let recommendations = recommendations(priority, recency, engagement, intent);

        LeadScoreResult {
            contact_id: contact.id,
            contact_name: contact.name.clone(),
            lead_status: status,
            last_contacted_date: contact.last_contacted_date,
            score,
            factors,
            priority,
            recommendations,
            defaults_applied,
        }
    }

    /// Scores every contact and returns them ranked.
    pub fn rank(
        &self,
        contacts: &[Contact],
        engagement: &HashMap<ContactId, Engagement>,
        now: DateTime<Utc>,
    ) -> Vec<LeadScoreResult> {
        let mut results: Vec<LeadScoreResult> = contacts
            .iter()
            .map(|contact| self.score(contact, engagement.get(&contact.id).copied(), now))
            .collect();
        sort_ranked(&mut results);
        results
    }
}

/// Score descending, then most recent contact first (never-contacted last),
/// then contact id ascending.
pub fn sort_ranked(results: &mut [LeadScoreResult]) {
    results.sort_by(|left, right| {
        right
            .score
            .cmp(&left.score)
            .then_with(|| compare_recent_first(left.last_contacted_date, right.last_contacted_date))
            .then_with(|| left.contact_id.cmp(&right.contact_id))
    });
}

fn compare_recent_first(left: Option<DateTime<Utc>>, right: Option<DateTime<Utc>>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Intent signal from free-text notes. Any high-intent term saturates the factor.
pub fn intent_signal(notes: &str, knowledge: &KnowledgeBase) -> f64 {
    let text = notes.to_lowercase();
    let terms = &knowledge.intent_terms;
    if terms.high.iter().any(|term| text.contains(term.as_str())) {
        return 100.0;
    }

    let medium = terms.medium.iter().filter(|term| text.contains(term.as_str())).count() as f64;
    let negative = terms.negative.iter().filter(|term| text.contains(term.as_str())).count() as f64;
    (INTENT_BASELINE + medium * INTENT_MEDIUM_STEP - negative * INTENT_NEGATIVE_STEP)
        .clamp(0.0, 100.0)
}

fn recommendations(priority: PriorityLevel, recency: f64, engagement: f64, intent: f64) -> Vec<String> {
    let mut lines = vec![match priority {
        PriorityLevel::High => "HIGH PRIORITY: contact immediately, very likely to convert",
        PriorityLevel::Medium => "Schedule a follow-up within 24-48 hours",
        PriorityLevel::Low => "Add to the nurture campaign",
        PriorityLevel::VeryLow => "Low priority: periodic check-ins only",
    }
    .to_string()];

    if recency < 40.0 {
        lines.push("Re-engage: it has been a while since the last contact".to_string());
    }
    if engagement < 30.0 {
        lines.push("Share matching listings to lift engagement".to_string());
    }
    if intent > 70.0 {
        lines.push("Strong buying signals in notes".to_string());
    }
    lines
}
