//! Resolves free-text entity mentions against stored records.
//!
//! Matching is whole-word over normalised text, so "Palm Tower 12" never
//! resolves to unit 1204. Callers turn `Ambiguous` and `NotFound` into
//! clarifying questions.

use crate::domain::contact::Contact;
use crate::domain::property::Property;

/// Shortest name token considered for partial contact matches.
const MIN_NAME_TOKEN_LEN: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
    Unique(T),
    Ambiguous(Vec<T>),
    NotFound,
}

impl<T> Resolution<T> {
    fn from_candidates(mut candidates: Vec<T>) -> Self {
        match candidates.len() {
            0 => Self::NotFound,
            1 => candidates.pop().map(Self::Unique).unwrap_or(Self::NotFound),
            _ => Self::Ambiguous(candidates),
        }
    }

    pub fn unique(self) -> Option<T> {
        match self {
            Self::Unique(value) => Some(value),
            Self::Ambiguous(_) | Self::NotFound => None,
        }
    }
}

/// Lowercase, drop `#`, turn other punctuation into spaces, collapse runs of
/// whitespace.
pub fn normalize_mention(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|ch| *ch != '#')
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_phrase(padded_haystack: &str, phrase: &str) -> bool {
    !phrase.is_empty() && padded_haystack.contains(&format!(" {phrase} "))
}

/// A building match needs a unit match too. A building named without a
/// matching unit comes back `Ambiguous` with that building's units, even when
/// only one is stored. Unit-only matching applies when no building matches.
pub fn resolve_property<'a>(mention: &str, properties: &'a [Property]) -> Resolution<&'a Property> {
    let padded = format!(" {} ", normalize_mention(mention));
    let unit_hit = |property: &Property| contains_phrase(&padded, &normalize_mention(&property.unit));
    let building_hits: Vec<&Property> = properties
        .iter()
        .filter(|property| contains_phrase(&padded, &normalize_mention(&property.building)))
        .collect();

    if !building_hits.is_empty() {
        let exact: Vec<&Property> =
            building_hits.iter().copied().filter(|property| unit_hit(property)).collect();
        if !exact.is_empty() {
            return Resolution::from_candidates(exact);
        }
        return Resolution::Ambiguous(building_hits);
    }

    Resolution::from_candidates(properties.iter().filter(|property| unit_hit(property)).collect())
}

pub fn resolve_contact<'a>(mention: &str, contacts: &'a [Contact]) -> Resolution<&'a Contact> {
    let padded = format!(" {} ", normalize_mention(mention));
    let full: Vec<&Contact> = contacts
        .iter()
        .filter(|contact| contains_phrase(&padded, &normalize_mention(&contact.name)))
        .collect();
    if !full.is_empty() {
        return Resolution::from_candidates(full);
    }

    let partial = contacts
        .iter()
        .filter(|contact| {
            normalize_mention(&contact.name)
                .split(' ')
                .filter(|token| token.chars().count() >= MIN_NAME_TOKEN_LEN)
                .any(|token| contains_phrase(&padded, token))
        })
        .collect();
    Resolution::from_candidates(partial)
}
