//! Deal close-probability estimation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{days_between, recency_score, FactorContribution};
use crate::domain::contact::Contact;
use crate::domain::deal::{Deal, DealId, DealStatus};
use crate::knowledge::KnowledgeBase;

/// Deals younger than this keep full freshness.
const FRESH_DEAL_DAYS: f64 = 7.0;
/// Freshness halves every this many days after the fresh window.
const FRESHNESS_HALF_LIFE_DAYS: f64 = 30.0;
const UNKNOWN_AGE_FRESHNESS: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityWeights {
    pub lead_score: f64,
    pub source: f64,
    pub age: f64,
    pub recency: f64,
}

impl Default for ProbabilityWeights {
    fn default() -> Self {
        Self { lead_score: 0.45, source: 0.15, age: 0.25, recency: 0.15 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityFactor {
    LeadScore,
    Source,
    Age,
    Recency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Moderate,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.8 {
            Self::VeryHigh
        } else if probability >= 0.6 {
            Self::High
        } else if probability >= 0.4 {
            Self::Moderate
        } else if probability >= 0.2 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DealProbability {
    pub deal_id: DealId,
    /// Always within `0.0..=1.0`.
    pub probability: f64,
    pub confidence: ConfidenceLevel,
    pub age_days: Option<f64>,
    pub factors: Vec<FactorContribution<ProbabilityFactor>>,
    pub recommendations: Vec<String>,
}

impl DealProbability {
    pub fn percentage(&self) -> u8 {
        (self.probability * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

pub struct DealEstimator<'a> {
    knowledge: &'a KnowledgeBase,
    weights: ProbabilityWeights,
}

impl<'a> DealEstimator<'a> {
    pub fn new(knowledge: &'a KnowledgeBase) -> Self {
        Self { knowledge, weights: ProbabilityWeights::default() }
    }

    pub fn with_weights(knowledge: &'a KnowledgeBase, weights: ProbabilityWeights) -> Self {
        Self { knowledge, weights }
    }

    /// Probability that `deal` closes, given the linked contact and its
    /// current lead score (`0..=100`).
    ///
    /// Non-decreasing in `lead_score` and non-increasing in deal age.
    pub fn estimate(
        &self,
        deal: &Deal,
        contact: &Contact,
        lead_score: u8,
        now: DateTime<Utc>,
    ) -> DealProbability {
        let weights = &self.weights;
        let age_days = deal.created_date.map(|created| days_between(created, now));
        let contact_days = contact.last_contacted_date.map(|at| days_between(at, now));

        let factors = vec![
            FactorContribution::new(
                ProbabilityFactor::LeadScore,
                f64::from(lead_score.min(100)) / 100.0,
                weights.lead_score,
            ),
            FactorContribution::new(
                ProbabilityFactor::Source,
                self.knowledge.source_score(contact.source.as_deref()) / 100.0,
                weights.source,
            ),
            FactorContribution::new(
                ProbabilityFactor::Age,
                age_days.map(freshness).unwrap_or(UNKNOWN_AGE_FRESHNESS),
                weights.age,
            ),
            FactorContribution::new(
                ProbabilityFactor::Recency,
                contact_days.map(|days| recency_score(days) / 100.0).unwrap_or(0.0),
                weights.recency,
            ),
        ];

        let blended: f64 = factors.iter().map(|factor| factor.contribution).sum();
        let probability = match deal.status {
            DealStatus::Closed => 1.0,
            DealStatus::Lost | DealStatus::Cancelled => 0.0,
            DealStatus::Active | DealStatus::Pending => blended.clamp(0.0, 1.0),
        };

        let recommendations = if deal.status.is_open() {
            open_deal_recommendations(probability, &factors, lead_score, age_days, contact_days)
        } else {
            vec![format!("Deal is {}; no action needed", deal.status.as_str().to_lowercase())]
        };

        DealProbability {
            deal_id: deal.id,
            probability,
            confidence: ConfidenceLevel::from_probability(probability),
            age_days,
            factors,
            recommendations,
        }
    }
}

fn freshness(age_days: f64) -> f64 {
    if age_days <= FRESH_DEAL_DAYS {
        1.0
    } else {
        0.5_f64.powf((age_days - FRESH_DEAL_DAYS) / FRESHNESS_HALF_LIFE_DAYS)
    }
}

fn open_deal_recommendations(
    probability: f64,
    factors: &[FactorContribution<ProbabilityFactor>],
    lead_score: u8,
    age_days: Option<f64>,
    contact_days: Option<f64>,
) -> Vec<String> {
    let mut lines = vec![if probability < 0.4 {
        "Deal at risk: needs attention this week".to_string()
    } else if probability < 0.6 {
        "Moderate odds: keep momentum with regular touchpoints".to_string()
    } else {
        "On track: prepare paperwork and confirm financing".to_string()
    }];

    let weakest = factors.iter().min_by(|left, right| left.normalized.total_cmp(&right.normalized));
    if let Some(weakest) = weakest {
        lines.push(match weakest.factor {
            ProbabilityFactor::LeadScore => {
                format!("Lead score is only {lead_score}; re-qualify budget and timeline")
            }
            ProbabilityFactor::Source => {
                "Low-quality lead source; confirm motivation directly".to_string()
            }
            ProbabilityFactor::Age => match age_days {
                Some(days) => format!(
                    "Deal has been open {} days; agree concrete next steps or a closing date",
                    days.floor()
                ),
                None => "Deal has no start date; record when negotiations began".to_string(),
            },
            ProbabilityFactor::Recency => match contact_days {
                Some(days) => format!(
                    "Contact has not been reached in {} days; recommend follow-up",
                    days.floor()
                ),
                None => "Contact has never been reached; recommend follow-up".to_string(),
            },
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{ConfidenceLevel, DealEstimator};
    use crate::domain::contact::{Contact, ContactId, LeadStatus};
    use crate::domain::deal::{Deal, DealId, DealStatus};
    use crate::domain::property::PropertyId;
    use crate::knowledge::KnowledgeBase;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).single().expect("valid date")
    }

    fn deal(age_days: Option<i64>, status: DealStatus) -> Deal {
        Deal {
            id: DealId(7),
            contact_id: ContactId(1),
            property_id: PropertyId(3),
            deal_type: Some("Sale".to_string()),
            status,
            deal_value: Decimal::from(2_500_000),
            commission: None,
            created_date: age_days.map(|days| now() - Duration::days(days)),
            closing_date: None,
        }
    }

    fn buyer(contacted_days_ago: Option<i64>) -> Contact {
        let mut contact = Contact::new(1, "Sara Khan", LeadStatus::Hot);
        contact.source = Some("Website".to_string());
        contact.last_contacted_date = contacted_days_ago.map(|days| now() - Duration::days(days));
        contact
    }

    #[test]
    fn probability_is_monotone_in_lead_score() {
        let knowledge = KnowledgeBase::default();
        let estimator = DealEstimator::new(&knowledge);
        for age in [None, Some(0), Some(20), Some(365)] {
            for contacted in [None, Some(2), Some(60)] {
                let deal = deal(age, DealStatus::Active);
                let contact = buyer(contacted);
                let mut previous = -1.0;
                for score in 0..=100u8 {
                    let estimate = estimator.estimate(&deal, &contact, score, now());
                    assert!((0.0..=1.0).contains(&estimate.probability));
                    assert!(estimate.probability >= previous, "dropped at score {score}");
                    previous = estimate.probability;
                }
            }
        }
    }

    #[test]
    fn probability_never_rises_with_age() {
        let knowledge = KnowledgeBase::default();
        let estimator = DealEstimator::new(&knowledge);
        for score in [0u8, 35, 70, 100] {
            let contact = buyer(Some(4));
            let mut previous = 2.0;
            for age in 0..=500 {
                let estimate = estimator.estimate(&deal(Some(age), DealStatus::Pending), &contact, score, now());
                assert!(estimate.probability <= previous, "rose at age {age}");
                previous = estimate.probability;
            }
        }
    }

    #[test]
    fn fresh_strong_deal_is_likely() {
        let knowledge = KnowledgeBase::default();
        let estimate = DealEstimator::new(&knowledge).estimate(
            &deal(Some(3), DealStatus::Active),
            &buyer(Some(1)),
            90,
            now(),
        );
        // 0.45*0.9 + 0.15*0.6 + 0.25 + 0.15
        assert!((estimate.probability - 0.895).abs() < 1e-9);
        assert_eq!(estimate.confidence, ConfidenceLevel::VeryHigh);
    }

    #[test]
    fn terminal_statuses_pin_probability() {
        let knowledge = KnowledgeBase::default();
        let estimator = DealEstimator::new(&knowledge);
        let closed = estimator.estimate(&deal(Some(90), DealStatus::Closed), &buyer(None), 10, now());
        let lost = estimator.estimate(&deal(Some(1), DealStatus::Lost), &buyer(Some(0)), 100, now());
        assert_eq!(closed.probability, 1.0);
        assert_eq!(lost.probability, 0.0);
        assert_eq!(lost.confidence, ConfidenceLevel::VeryLow);
    }

    #[test]
    fn weakest_factor_drives_the_recommendation() {
        let knowledge = KnowledgeBase::default();
        let estimate = DealEstimator::new(&knowledge).estimate(
            &deal(Some(2), DealStatus::Active),
            &buyer(None),
            80,
            now(),
        );
        assert_eq!(estimate.recommendations.len(), 2);
        assert_eq!(
            estimate.recommendations[1],
            "Contact has never been reached; recommend follow-up"
        );
    }
}
