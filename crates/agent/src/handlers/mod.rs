//! Tier 2 handlers, one per actionable intent.
//!
//! Handlers resolve the classifier's raw mentions themselves. An ambiguous
//! or unmatched mention becomes a clarifying question, never an error.

pub mod deals;
pub mod email;
pub mod leads;
pub mod owner;
pub mod properties;
pub mod reports;
pub mod tasks;
pub mod viewings;

pub(crate) use aura_core::analytics::format_aed;
use aura_core::domain::contact::Contact;
use aura_core::domain::property::Property;
use aura_core::resolve::{resolve_contact, resolve_property, Resolution};

/// Tries each mention on its own, then all of them joined (classifiers
/// sometimes split "Palm Tower" and "3401"). The first unique hit wins.
fn resolve_mentions<'a, T>(
    entities: &[String],
    resolve: impl Fn(&str) -> Resolution<&'a T>,
) -> Resolution<&'a T> {
    let mut mentions: Vec<String> = entities
        .iter()
        .map(|entity| entity.trim().to_string())
        .filter(|entity| !entity.is_empty())
        .collect();
    if mentions.len() > 1 {
        mentions.push(mentions.join(" "));
    }

    let mut ambiguous = None;
    for mention in &mentions {
        match resolve(mention) {
            Resolution::Unique(found) => return Resolution::Unique(found),
            Resolution::Ambiguous(candidates) => {
                ambiguous.get_or_insert(candidates);
            }
            Resolution::NotFound => {}
        }
    }
    ambiguous.map(Resolution::Ambiguous).unwrap_or(Resolution::NotFound)
}

pub(crate) fn resolve_property_mentions<'a>(
    entities: &[String],
    properties: &'a [Property],
) -> Resolution<&'a Property> {
    resolve_mentions(entities, |mention| resolve_property(mention, properties))
}

pub(crate) fn resolve_contact_mentions<'a>(
    entities: &[String],
    contacts: &'a [Contact],
) -> Resolution<&'a Contact> {
    resolve_mentions(entities, |mention| resolve_contact(mention, contacts))
}

pub(crate) fn joined(entities: &[String]) -> String {
    entities.iter().map(|entity| entity.trim()).filter(|e| !e.is_empty()).collect::<Vec<_>>().join(" ")
}

pub(crate) fn which_property(candidates: &[&Property]) -> String {
    let labels: Vec<String> = candidates.iter().map(|property| property.label()).collect();
    format!("Which property do you mean: {}?", labels.join(", "))
}

pub(crate) fn which_contact(candidates: &[&Contact]) -> String {
    let names: Vec<&str> = candidates.iter().map(|contact| contact.name.as_str()).collect();
    format!("Which contact do you mean: {}?", names.join(", "))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use aura_core::knowledge::KnowledgeBase;
    use aura_core::scoring::FollowUpPolicy;
    use aura_db::{InMemoryCrmStore, SampleDataset};

    use crate::tools::ToolContext;

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid date")
    }

    /// In-memory store holding the sample portfolio.
    pub async fn sample_store() -> Arc<InMemoryCrmStore> {
        let store = Arc::new(InMemoryCrmStore::new());
        let dataset = SampleDataset::build(now());
        for property in dataset.properties {
            store.insert_property(property).await;
        }
        for contact in dataset.contacts {
            store.insert_contact(contact).await;
        }
        for deal in dataset.deals {
            store.insert_deal(deal).await;
        }
        for task in dataset.tasks {
            store.insert_task(task).await;
        }
        for link in dataset.links {
            store.link(link).await;
        }
        store
    }

    pub async fn context() -> ToolContext {
        ToolContext {
            store: sample_store().await,
            knowledge: Arc::new(KnowledgeBase::default()),
            follow_up_policy: FollowUpPolicy::default(),
            now: now(),
            correlation_id: "test".to_string(),
        }
    }

    pub fn entities(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }
}
