use async_trait::async_trait;
use serde_json::json;

use aura_core::automation::{latest_interest, EmailComposer};
use aura_core::domain::contact::{Contact, LeadStatus};
use aura_core::resolve::Resolution;
use aura_core::store::{ContactFilter, PropertyFilter, RelationshipFilter};

use super::{resolve_contact_mentions, which_contact};
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};

/// Drafts, never sends.
pub struct DraftEmail;

#[async_trait]
impl Tool for DraftEmail {
    fn intent(&self) -> Intent {
        Intent::DraftEmail
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        if entities.is_empty() {
            return Ok(ToolOutcome::clarify("Who should the email go to?"));
        }

        let contacts = ctx.store.list_contacts(&ContactFilter::default()).await?;
        let contact = match resolve_contact_mentions(entities, &contacts) {
            Resolution::Unique(contact) => contact,
            Resolution::Ambiguous(candidates) => {
                return Ok(ToolOutcome::clarify(which_contact(&candidates)))
            }
            Resolution::NotFound => {
                return Ok(ToolOutcome::clarify(format!(
                    "I couldn't find a contact matching '{}'. Who should the email go to?",
                    super::joined(entities)
                )))
            }
        };

        let links = ctx
            .store
            .list_relationships(&RelationshipFilter {
                contact_id: Some(contact.id),
                ..RelationshipFilter::default()
            })
            .await?;
        let properties = ctx.store.list_properties(&PropertyFilter::default()).await?;
        let interest = latest_interest(contact.id, &links, &properties);

        let template = pick_template(&super::joined(entities), contact);
        let draft = EmailComposer::new(&ctx.knowledge)?.compose(contact, interest, template)?;

        let recipient = match &draft.to_email {
            Some(email) => format!("{} <{}>", draft.to_name, email),
            None => format!("{} (no email on file)", draft.to_name),
        };
        let text = format!("Draft email to {recipient}:\n\nSubject: {}\n\n{}", draft.subject, draft.body);
        Ok(ToolOutcome::answer(text, json!({ "draft": draft })))
    }
}

fn pick_template(request: &str, contact: &Contact) -> &'static str {
    let request = request.to_lowercase();
    if request.contains("welcome") {
        "welcome_new_lead"
    } else if request.contains("viewing") {
        "viewing_confirmation"
    } else if contact.effective_status() == LeadStatus::Hot {
        "follow_up_hot"
    } else {
        "follow_up_general"
    }
}
