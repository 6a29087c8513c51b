use async_trait::async_trait;
use serde_json::json;

use aura_core::domain::relationship::RelationshipKind;
use aura_core::resolve::Resolution;
use aura_core::store::{PropertyFilter, RelationshipFilter};

use super::{resolve_property_mentions, which_property};
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};

pub struct FindOwner;

#[async_trait]
impl Tool for FindOwner {
    fn intent(&self) -> Intent {
        Intent::FindOwner
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        if entities.is_empty() {
            return Ok(ToolOutcome::clarify(
                "I couldn't identify a specific property in your query. Please provide the building name and unit number.",
            ));
        }

        let properties = ctx.store.list_properties(&PropertyFilter::default()).await?;
        let property = match resolve_property_mentions(entities, &properties) {
            Resolution::Unique(property) => property,
            Resolution::Ambiguous(candidates) => {
                return Ok(ToolOutcome::clarify(which_property(&candidates)))
            }
            Resolution::NotFound => {
                return Ok(ToolOutcome::clarify(format!(
                    "I couldn't find a property matching '{}'. Please provide the building name and unit number.",
                    super::joined(entities)
                )))
            }
        };

        let owner_links = ctx
            .store
            .list_relationships(&RelationshipFilter {
                property_id: Some(property.id),
                kinds: vec![RelationshipKind::Owner],
                ..RelationshipFilter::default()
            })
            .await?;

        let mut owners = Vec::new();
        for link in &owner_links {
            if let Some(contact) = ctx.store.get_contact(link.contact_id).await? {
                owners.push(contact);
            }
        }

        if owners.is_empty() {
            return Ok(ToolOutcome::answer(
                format!("No owner found for {}.", property.label()),
                json!({ "property": property, "owners": [] }),
            ));
        }

        let lines: Vec<String> = owners
            .iter()
            .map(|owner| {
                let reach: Vec<&str> =
                    [owner.email.as_deref(), owner.phone.as_deref()].into_iter().flatten().collect();
                if reach.is_empty() {
                    format!("Owner of {}: {}", property.label(), owner.name)
                } else {
                    format!("Owner of {}: {} ({})", property.label(), owner.name, reach.join(", "))
                }
            })
            .collect();

        Ok(ToolOutcome::answer(lines.join("\n"), json!({ "property": property, "owners": owners })))
    }
}
