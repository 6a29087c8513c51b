use async_trait::async_trait;

use crate::conversation::Turn;
use crate::intent::{Classification, Intent};
use crate::llm::{IntentClassifier, LlmError};

/// One command rule: any phrase from `triggers`, plus any phrase from
/// `qualifiers` when that list is non-empty.
struct Rule {
    intent: Intent,
    triggers: &'static [&'static str],
    qualifiers: &'static [&'static str],
}

/// Evaluated in order; the first rule that matches wins.
const RULES: &[Rule] = &[
    Rule { intent: Intent::FindOwner, triggers: &["who owns", "owner of", "owns "], qualifiers: &[] },
    Rule { intent: Intent::CreateTask, triggers: &["create task", "add task", "new task", "remind me to"], qualifiers: &[] },
    Rule {
        intent: Intent::ScheduleViewing,
        triggers: &["viewing"],
        qualifiers: &["schedule", "book", "arrange", "set up"],
    },
    Rule {
        intent: Intent::DraftEmail,
        triggers: &["email"],
        qualifiers: &["draft", "write", "compose", "prepare"],
    },
    Rule { intent: Intent::FollowUps, triggers: &["follow up", "follow-up", "followup"], qualifiers: &[] },
    Rule { intent: Intent::OverdueTasks, triggers: &["overdue"], qualifiers: &[] },
    Rule {
        intent: Intent::LeadScores,
        triggers: &["lead score", "score leads", "score my leads", "rank leads", "top leads"],
        qualifiers: &[],
    },
    Rule { intent: Intent::FindBuyers, triggers: &["find buyers", "matching buyers", "buyers for", "potential buyers"], qualifiers: &[] },
    Rule {
        intent: Intent::DealProbability,
        triggers: &["probability", "chance of closing", "likely to close", "likelihood"],
        qualifiers: &[],
    },
    Rule {
        intent: Intent::SearchProperties,
        triggers: &["property", "properties", "apartment", "villa", "listing"],
        qualifiers: &["find", "search", "show", "list", "looking for"],
    },
    Rule { intent: Intent::MarketInsights, triggers: &["market"], qualifiers: &["insight", "analysis", "overview", "trend"] },
    Rule { intent: Intent::Performance, triggers: &["performance", "metrics", "kpi"], qualifiers: &[] },
    Rule { intent: Intent::DailyBriefing, triggers: &["daily briefing", "briefing", "my day"], qualifiers: &[] },
];

const LEADING_FILLERS: &[&str] = &["for", "of", "the", "in", "at", "about", "to", "with", "on", "a", "an", "is", "are"];

/// Deterministic phrase classifier. Backs the offline provider and needs no
/// network, so it never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_text(&self, utterance: &str) -> Classification {
        let lowered = utterance.to_ascii_lowercase();
        for rule in RULES {
            let Some(trigger_end) = last_match_end(&lowered, rule.triggers) else {
                continue;
            };
            let end = if rule.qualifiers.is_empty() {
                trigger_end
            } else {
                match last_match_end(&lowered, rule.qualifiers) {
                    Some(qualifier_end) => trigger_end.max(qualifier_end),
                    None => continue,
                }
            };

            let entities = entity_after(utterance, end).into_iter().collect();
            return Classification::new(rule.intent, entities);
        }
        Classification::unknown()
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        utterance: &str,
        _history: &[Turn],
    ) -> Result<Classification, LlmError> {
        Ok(self.classify_text(utterance))
    }
}

/// Byte offset just past the furthest matching phrase. A phrase that stops
/// mid-word ("insight" in "insights") is extended to the end of that word.
fn last_match_end(lowered: &str, phrases: &[&str]) -> Option<usize> {
    phrases
        .iter()
        .filter_map(|phrase| {
            let end = lowered.find(phrase)? + phrase.len();
            if !phrase.ends_with(|c: char| c.is_alphanumeric()) {
                return Some(end);
            }
            Some(
                lowered[end..]
                    .char_indices()
                    .find(|(_, c)| !c.is_alphanumeric())
                    .map(|(offset, _)| end + offset)
                    .unwrap_or(lowered.len()),
            )
        })
        .max()
}

fn entity_after(utterance: &str, end: usize) -> Option<String> {
    let rest = utterance.get(end..)?;
    let mut words: Vec<&str> = rest
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| matches!(c, '?' | '!' | ',' | ':' | ';' | '"')))
        .filter(|word| !word.is_empty())
        .collect();
    while let Some(first) = words.first() {
        if LEADING_FILLERS.contains(&first.to_ascii_lowercase().as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }
    let entity = words.join(" ").trim_end_matches('.').trim().to_string();
    (!entity.is_empty()).then_some(entity)
}
