use async_trait::async_trait;
use serde_json::json;

use aura_core::domain::property::Property;
use aura_core::resolve::Resolution;
use aura_core::scoring::profile::{parse_preferences, PartialProfile};
use aura_core::store::PropertyFilter;

use super::{format_aed, resolve_property_mentions, which_property};
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::workflows;

const BUYERS_SHOWN: usize = 3;
const SEARCH_LIMIT: usize = 5;

pub struct FindBuyers;

#[async_trait]
impl Tool for FindBuyers {
    fn intent(&self) -> Intent {
        Intent::FindBuyers
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        if entities.is_empty() {
            return Ok(ToolOutcome::clarify("Please specify a property to find buyers for."));
        }

        let properties = ctx.store.list_properties(&PropertyFilter::default()).await?;
        let property = match resolve_property_mentions(entities, &properties) {
            Resolution::Unique(property) => property,
            Resolution::Ambiguous(candidates) => {
                return Ok(ToolOutcome::clarify(which_property(&candidates)))
            }
            Resolution::NotFound => {
                return Ok(ToolOutcome::clarify(format!(
                    "I couldn't find a property matching '{}'. Which building and unit do you mean?",
                    super::joined(entities)
                )))
            }
        };

        let buyers =
            workflows::buyers_for_property(ctx.store.as_ref(), &ctx.knowledge, property, ctx.now)
                .await?;
        if buyers.is_empty() {
            return Ok(ToolOutcome::answer(
                "No potential buyers found for this property.",
                json!({ "property": property, "buyers": [] }),
            ));
        }

        let mut text = format!("Potential buyers for {}:\n\n", property.label());
        for buyer in buyers.iter().take(BUYERS_SHOWN) {
            let email = ctx
                .store
                .get_contact(buyer.contact_id)
                .await?
                .and_then(|contact| contact.email)
                .unwrap_or_else(|| "no email on file".to_string());
            text.push_str(&format!(
                "• {} ({} lead, match {}%) - {}\n",
                buyer.contact_name, buyer.lead_status, buyer.match_score, email
            ));
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "property": property, "buyers": buyers })))
    }
}

/// Searches available listings. Recognised preferences ("2br villa in
/// marina under 3m") become structured filters; anything else is matched
/// as a substring of building, area or type.
pub struct SearchProperties;

#[async_trait]
impl Tool for SearchProperties {
    fn intent(&self) -> Intent {
        Intent::SearchProperties
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let query = super::joined(entities);
        let available = ctx.store.list_properties(&PropertyFilter::available()).await?;

        let preferences = parse_preferences(&query, &ctx.knowledge);
        let found: Vec<&Property> = if query.is_empty() {
            available.iter().collect()
        } else if !preferences.is_empty() {
            available.iter().filter(|property| fits(&preferences, property)).collect()
        } else {
            let needle = query.to_lowercase();
            available.iter().filter(|property| mentions(property, &needle)).collect()
        };

        if found.is_empty() {
            return Ok(ToolOutcome::answer(
                format!("No properties found matching '{query}'"),
                json!({ "properties": [] }),
            ));
        }

        let shown: Vec<&Property> = found.into_iter().take(SEARCH_LIMIT).collect();
        let mut text = if query.is_empty() {
            String::from("Available properties:\n\n")
        } else {
            format!("Properties matching '{query}':\n\n")
        };
        for property in &shown {
            text.push_str(&listing_line(property));
            text.push('\n');
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "properties": shown })))
    }
}

fn fits(preferences: &PartialProfile, property: &Property) -> bool {
    let lowered = |value: &Option<String>| value.as_deref().map(str::to_lowercase).unwrap_or_default();
    let kind = lowered(&property.property_type);
    let area = lowered(&property.area);

    if !preferences.property_types.is_empty() && !preferences.property_types.contains(&kind) {
        return false;
    }
    if !preferences.areas.is_empty() && !preferences.areas.iter().any(|wanted| area.contains(wanted.as_str())) {
        return false;
    }
    if let Some(bedrooms) = preferences.bedrooms {
        if property.bedrooms.map(|count| count < bedrooms).unwrap_or(true) {
            return false;
        }
    }
    if let Some(ceiling) = preferences.price_ceiling {
        if property.price.map(|price| price > ceiling).unwrap_or(true) {
            return false;
        }
    }
    true
}

fn mentions(property: &Property, needle: &str) -> bool {
    [Some(property.building.as_str()), property.area.as_deref(), property.property_type.as_deref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

fn listing_line(property: &Property) -> String {
    let rooms = match (property.bedrooms, property.bathrooms) {
        (Some(beds), Some(baths)) => format!("{beds}BR/{baths}BA"),
        (Some(beds), None) => format!("{beds}BR"),
        _ => "rooms n/a".to_string(),
    };
    let price = property.price.map(format_aed).unwrap_or_else(|| "price on request".to_string());
    format!(
        "• {} - {} ({}) - {} - {}",
        property.label(),
        property.area.as_deref().unwrap_or("area n/a"),
        property.property_type.as_deref().unwrap_or("type n/a"),
        rooms,
        price
    )
}

#[cfg(test)]
mod tests {
    use super::{FindBuyers, SearchProperties};
    use crate::handlers::test_support::{context, entities};
    use crate::tools::{Tool, ToolOutcome};

    fn answer_text(outcome: ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Answer { text, .. } => text,
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buyers_for_the_villa_exclude_cold_leads() {
        let ctx = context().await;
        let text = answer_text(
            FindBuyers.execute(&entities(&["Garden Homes Villa 42"]), &ctx).await.expect("run"),
        );
        assert!(text.starts_with("Potential buyers for Garden Homes Unit Villa 42:"));
        let first = text.lines().find(|line| line.starts_with('•')).expect("a buyer line");
        assert!(first.starts_with("• Ahmed Al Futtaim (Hot lead"));
        assert!(!text.contains("John Smith"));
    }

    #[tokio::test]
    async fn buyers_need_a_property() {
        let ctx = context().await;
        assert_eq!(
            FindBuyers.execute(&[], &ctx).await.expect("run"),
            ToolOutcome::clarify("Please specify a property to find buyers for.")
        );
        assert!(matches!(
            FindBuyers.execute(&entities(&["Burj Vista 9"]), &ctx).await.expect("run"),
            ToolOutcome::Clarify { .. }
        ));
    }

    #[tokio::test]
    async fn structured_search_filters_by_type_and_area() {
        let ctx = context().await;
        let text = answer_text(
            SearchProperties.execute(&entities(&["villa in palm jumeirah"]), &ctx).await.expect("run"),
        );
        assert!(text.contains("Garden Homes Unit Villa 42"));
        assert!(text.contains("AED 12,000,000"));
        assert!(!text.contains("Shoreline"));
    }

    #[tokio::test]
    async fn free_text_search_matches_building_names() {
        let ctx = context().await;
        let text =
            answer_text(SearchProperties.execute(&entities(&["shoreline"]), &ctx).await.expect("run"));
        assert!(text.contains("Shoreline Apartments Unit 101"));

        let none = answer_text(SearchProperties.execute(&entities(&["tower"]), &ctx).await.expect("run"));
        assert_eq!(none, "No properties found matching 'tower'");
    }
}
