//! Deterministic scoring engine.
//!
//! Every function here is pure: callers pass entity snapshots, the knowledge
//! base, and `now`. Nothing reads the clock, storage, or the network, so
//! scoring can run per-contact in parallel without coordination.

pub mod follow_up;
pub mod lead;
pub mod matching;
pub mod probability;
pub mod profile;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use follow_up::{FollowUpPolicy, FollowUpTask};
pub use lead::{Engagement, LeadFactor, LeadScoreResult, LeadScorer, LeadWeights, PriorityLevel};
pub use matching::{BuyerMatch, BuyerMatcher, MatchWeights};
pub use probability::{
    ConfidenceLevel, DealEstimator, DealProbability, ProbabilityFactor, ProbabilityWeights,
};
pub use profile::{BuyerProfile, PartialProfile};

/// Recency anchors as (days since contact, score). Linear between anchors.
const RECENCY_CURVE: &[(f64, f64)] = &[
    (0.0, 100.0),
    (1.0, 100.0),
    (3.0, 80.0),
    (7.0, 60.0),
    (30.0, 40.0),
    (90.0, 20.0),
    (180.0, 10.0),
];

/// Score used when a contact has never been reached.
pub const RECENCY_UNKNOWN_SCORE: f64 = 30.0;

/// One weighted input of a score, kept for auditability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution<K> {
    pub factor: K,
    /// Factor value before weighting.
    pub normalized: f64,
    pub weight: f64,
    /// `normalized * weight`.
    pub contribution: f64,
}

impl<K> FactorContribution<K> {
    pub fn new(factor: K, normalized: f64, weight: f64) -> Self {
        Self { factor, normalized, weight, contribution: normalized * weight }
    }
}

/// Fractional days from `then` to `now`, floored at zero for future dates.
pub fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - then).num_seconds() as f64;
    (seconds / 86_400.0).max(0.0)
}

/// Recency score in `0..=100`, non-increasing in `days`.
pub fn recency_score(days: f64) -> f64 {
    let days = days.max(0.0);
    for pair in RECENCY_CURVE.windows(2) {
        let (start_day, start_score) = pair[0];
        let (end_day, end_score) = pair[1];
        if days <= end_day {
            let span = end_day - start_day;
            if span <= f64::EPSILON {
                return end_score;
            }
            let progress = (days - start_day) / span;
            return start_score + (end_score - start_score) * progress;
        }
    }
    RECENCY_CURVE.last().map(|(_, score)| *score).unwrap_or(0.0)
}
