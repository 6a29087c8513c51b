use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use aura_core::automation::{parse_viewing_time, plan_viewing};
use aura_core::resolve::Resolution;
use aura_core::store::{ContactFilter, PropertyFilter};

use super::{resolve_contact_mentions, resolve_property_mentions, which_contact, which_property};
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};

const ASK_FOR_DETAILS: &str =
    "Who is the viewing for, which property, and when? For example: Fatima at Garden Homes Villa 42 tomorrow at 3pm.";
const ASK_FOR_TIME: &str = "When should the viewing be? For example: tomorrow at 3pm or 2026-03-09 15:00.";

/// Books a viewing: an open high-priority task due at the viewing time plus a
/// "Viewing Scheduled" link between the contact and the property.
pub struct ScheduleViewing;

#[async_trait]
impl Tool for ScheduleViewing {
    fn intent(&self) -> Intent {
        Intent::ScheduleViewing
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let text = super::joined(entities);
        if text.is_empty() {
            return Ok(ToolOutcome::clarify(ASK_FOR_DETAILS));
        }

        let contacts = ctx.store.list_contacts(&ContactFilter::default()).await?;
        let contact = match resolve_contact_mentions(entities, &contacts) {
            Resolution::Unique(contact) => contact,
            Resolution::Ambiguous(candidates) => {
                return Ok(ToolOutcome::clarify(which_contact(&candidates)))
            }
            Resolution::NotFound => {
                return Ok(ToolOutcome::clarify("Who is the viewing for? Please give the contact's name."))
            }
        };

        let properties = ctx.store.list_properties(&PropertyFilter::default()).await?;
        let property = match resolve_property_mentions(entities, &properties) {
            Resolution::Unique(property) => property,
            Resolution::Ambiguous(candidates) => {
                return Ok(ToolOutcome::clarify(which_property(&candidates)))
            }
            Resolution::NotFound => {
                return Ok(ToolOutcome::clarify(
                    "Which property is the viewing at? Please provide the building name and unit number.",
                ))
            }
        };

        let Some(at) = parse_viewing_time(&text, ctx.now) else {
            return Ok(ToolOutcome::clarify(ASK_FOR_TIME));
        };
        let viewing = match plan_viewing(contact, property, at, ctx.now) {
            Ok(viewing) => viewing,
            Err(error) => {
                debug!(
                    event_name = "agent.tool.viewing_rejected",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "viewing time rejected"
                );
                return Ok(ToolOutcome::clarify(format!(
                    "{} has already passed. {ASK_FOR_TIME}",
                    at.format("%Y-%m-%d %H:%M")
                )));
            }
        };

        let task = ctx.store.schedule_viewing(viewing).await?;
        info!(
            event_name = "agent.tool.viewing_scheduled",
            correlation_id = %ctx.correlation_id,
            task_id = task.id.0,
            contact_id = contact.id.0,
            property_id = property.id.0,
            "viewing scheduled from chat"
        );
        Ok(ToolOutcome::answer(
            format!(
                "Viewing scheduled: {} at {} on {} UTC.",
                contact.name,
                property.label(),
                at.format("%Y-%m-%d %H:%M")
            ),
            json!({ "task": task, "contact_id": contact.id, "property_id": property.id }),
        ))
    }
}
