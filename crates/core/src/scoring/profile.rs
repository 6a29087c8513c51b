//! Best-effort buyer preference extraction from free-text notes.
//!
//! Parsing never fails: notes that yield nothing usable become
//! [`BuyerProfile::NoProfile`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeBase;

const BEDROOM_WORDS: &[&str] = &["br", "bhk", "bed", "beds", "bedroom", "bedrooms", "bdr"];
const BUDGET_CONTEXT: &[&str] = &[
    "budget", "under", "max", "maximum", "upto", "up", "below", "within", "around", "about",
    "aed", "afford", "spend", "ceiling", "less",
];
const MAX_BEDROOMS: u32 = 20;
const MIN_BUDGET: i64 = 10_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuyerProfile {
    NoProfile,
    Partial(PartialProfile),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialProfile {
    pub bedrooms: Option<u8>,
    pub price_ceiling: Option<Decimal>,
    pub property_types: Vec<String>,
    pub areas: Vec<String>,
    pub urgent: bool,
}

impl PartialProfile {
    pub fn is_empty(&self) -> bool {
        self.bedrooms.is_none()
            && self.price_ceiling.is_none()
            && self.property_types.is_empty()
            && self.areas.is_empty()
    }
}

impl BuyerProfile {
    pub fn from_notes(notes: Option<&str>, knowledge: &KnowledgeBase) -> Self {
        let Some(notes) = notes.filter(|value| !value.trim().is_empty()) else {
            return Self::NoProfile;
        };
        let profile = parse_preferences(notes, knowledge);
        if profile.is_empty() {
            Self::NoProfile
        } else {
            Self::Partial(profile)
        }
    }

    pub fn partial(&self) -> Option<&PartialProfile> {
        match self {
            Self::NoProfile => None,
            Self::Partial(profile) => Some(profile),
        }
    }
}

/// Extracts whatever preferences the text mentions. Used for contact notes
/// and for ad-hoc property search queries alike.
pub fn parse_preferences(text: &str, knowledge: &KnowledgeBase) -> PartialProfile {
    let normalized = normalize(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let padded = format!(" {normalized} ");

    PartialProfile {
        bedrooms: parse_bedrooms(&tokens),
        price_ceiling: parse_budget(&tokens),
        property_types: knowledge
            .property_types
            .iter()
            .filter(|kind| {
                tokens.iter().any(|token| {
                    *token == kind.as_str() || token.strip_suffix('s') == Some(kind.as_str())
                })
            })
            .cloned()
            .collect(),
        areas: match_areas(&padded, &knowledge.areas),
        urgent: knowledge.intent_terms.high.iter().any(|term| normalized.contains(term.as_str())),
    }
}

fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut output = String::with_capacity(chars.len());
    for (index, ch) in chars.iter().enumerate() {
        let digit_before = index > 0 && chars[index - 1].is_ascii_digit();
        let digit_after = chars.get(index + 1).map(|next| next.is_ascii_digit()).unwrap_or(false);
        match ch {
            ',' if digit_before && digit_after => {}
            '.' if digit_before && digit_after => output.push('.'),
            '-' if !digit_before => output.push(*ch),
            c if c.is_alphanumeric() => output.push(*c),
            _ => output.push(' '),
        }
    }
    output
}

fn parse_bedrooms(tokens: &[&str]) -> Option<u8> {
    for (index, token) in tokens.iter().enumerate() {
        if *token == "studio" {
            return Some(0);
        }
        let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        let suffix = &token[digits.len()..];
        let followed_by_word =
            suffix.is_empty() && tokens.get(index + 1).map(|next| is_bedroom_word(next)).unwrap_or(false);
        if is_bedroom_word(suffix) || followed_by_word {
            if let Ok(count) = digits.parse::<u32>() {
                if count <= MAX_BEDROOMS {
                    return u8::try_from(count).ok();
                }
            }
        }
    }
    None
}

fn is_bedroom_word(word: &str) -> bool {
    let word = word.trim_start_matches('-');
    BEDROOM_WORDS.contains(&word)
}

/// First amount that reads like a budget: carries a k/m multiplier or sits
/// next to a budget word, and is at least 10,000.
pub fn parse_budget_text(text: &str) -> Option<Decimal> {
    let normalized = normalize(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    parse_budget(&tokens)
}

fn parse_budget(tokens: &[&str]) -> Option<Decimal> {
    for (index, token) in tokens.iter().enumerate() {
        let next = tokens.get(index + 1).copied();
        let Some((amount, has_multiplier)) = parse_amount(token, next) else {
            continue;
        };
        if amount < Decimal::from(MIN_BUDGET) {
            continue;
        }
        if next.map(|word| word.starts_with("sq") || is_bedroom_word(word)).unwrap_or(false) {
            continue;
        }
        let context_before = tokens[index.saturating_sub(3)..index]
            .iter()
            .any(|word| BUDGET_CONTEXT.contains(word));
        let currency_after = next == Some("aed") || next == Some("dirhams");
        if has_multiplier || context_before || currency_after {
            return Some(amount);
        }
    }
    None
}

fn parse_amount(token: &str, next: Option<&str>) -> Option<(Decimal, bool)> {
    let token = token.strip_prefix("aed").unwrap_or(token);
    let number_end = token.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(token.len());
    if number_end == 0 {
        return None;
    }
    let (number, suffix) = token.split_at(number_end);
    let value = number.parse::<Decimal>().ok()?;

    let attached = multiplier(suffix);
    if !suffix.is_empty() && attached.is_none() {
        return None;
    }
    if let Some(factor) = attached {
        return Some((value * factor, true));
    }
    if let Some(factor) = next.and_then(multiplier) {
        return Some((value * factor, true));
    }
    Some((value, false))
}

fn multiplier(word: &str) -> Option<Decimal> {
    match word {
        "m" | "mn" | "mil" | "million" => Some(Decimal::from(1_000_000)),
        "k" | "thousand" => Some(Decimal::from(1_000)),
        _ => None,
    }
}

fn match_areas(padded_text: &str, areas: &[String]) -> Vec<String> {
    let mut ordered: Vec<&String> = areas.iter().collect();
    ordered.sort_by(|left, right| right.len().cmp(&left.len()).then_with(|| left.cmp(right)));

    let mut matched: Vec<String> = Vec::new();
    for area in ordered {
        if !padded_text.contains(&format!(" {area} ")) {
            continue;
        }
        if matched.iter().any(|longer| longer.contains(area.as_str())) {
            continue;
        }
        matched.push(area.clone());
    }
    matched
}
