use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of user purposes the assistant can act on. `Unknown` is the
/// escalation sentinel: it never has a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FindOwner,
    CreateTask,
    ScheduleViewing,
    FollowUps,
    LeadScores,
    FindBuyers,
    SearchProperties,
    MarketInsights,
    Performance,
    DailyBriefing,
    DealProbability,
    DraftEmail,
    OverdueTasks,
    Unknown,
}

impl Intent {
    pub const ACTIONABLE: [Intent; 13] = [
        Intent::FindOwner,
        Intent::CreateTask,
        Intent::ScheduleViewing,
        Intent::FollowUps,
        Intent::LeadScores,
        Intent::FindBuyers,
        Intent::SearchProperties,
        Intent::MarketInsights,
        Intent::Performance,
        Intent::DailyBriefing,
        Intent::DealProbability,
        Intent::DraftEmail,
        Intent::OverdueTasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FindOwner => "find_owner",
            Self::CreateTask => "create_task",
            Self::ScheduleViewing => "schedule_viewing",
            Self::FollowUps => "follow_ups",
            Self::LeadScores => "lead_scores",
            Self::FindBuyers => "find_buyers",
            Self::SearchProperties => "search_properties",
            Self::MarketInsights => "market_insights",
            Self::Performance => "performance",
            Self::DailyBriefing => "daily_briefing",
            Self::DealProbability => "deal_probability",
            Self::DraftEmail => "draft_email",
            Self::OverdueTasks => "overdue_tasks",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse of a classifier token. Anything unrecognised is
    /// `Unknown`, never an error.
    pub fn from_token(raw: &str) -> Self {
        let folded = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ACTIONABLE
            .into_iter()
            .find(|intent| intent.as_str() == folded)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier 1 output: one intent plus the raw entity mentions the classifier
/// pulled out of the utterance. Mentions are resolved by handlers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    #[serde(default)]
    pub entities: Vec<String>,
}

impl Classification {
    pub fn new(intent: Intent, entities: Vec<String>) -> Self {
        Self { intent, entities }
    }

    pub fn unknown() -> Self {
        Self { intent: Intent::Unknown, entities: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn tokens_round_trip_and_unknown_is_the_fallback() {
        for intent in Intent::ACTIONABLE {
            assert_eq!(Intent::from_token(intent.as_str()), intent);
        }
        assert_eq!(Intent::from_token(" Find-Owner "), Intent::FindOwner);
        assert_eq!(Intent::from_token("Schedule Viewing"), Intent::ScheduleViewing);
        assert_eq!(Intent::from_token("book_flight"), Intent::Unknown);
        assert_eq!(Intent::from_token(""), Intent::Unknown);
    }
}
