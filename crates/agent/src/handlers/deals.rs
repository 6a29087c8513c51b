use async_trait::async_trait;
use serde_json::json;

use aura_core::domain::deal::{Deal, DealId};
use aura_core::resolve::{normalize_mention, Resolution};
use aura_core::store::{ContactFilter, DealFilter};

use super::{resolve_contact_mentions, which_contact};
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::workflows;

const ASK_FOR_DEAL: &str =
    "Which deal should I estimate? Give me a deal number or the client's name.";

/// Estimates close probability for a deal named by number ("deal 12",
/// "#12") or by its client, when that client has exactly one open deal.
pub struct DealProbability;

#[async_trait]
impl Tool for DealProbability {
    fn intent(&self) -> Intent {
        Intent::DealProbability
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let mention = super::joined(entities);
        if mention.is_empty() {
            return Ok(ToolOutcome::clarify(ASK_FOR_DEAL));
        }

        let deal_id = match deal_number(&mention) {
            Some(id) => id,
            None => match self.deal_for_contact(entities, ctx).await? {
                Ok(id) => id,
                Err(question) => return Ok(ToolOutcome::clarify(question)),
            },
        };

        let Some(estimate) =
            workflows::deal_probability(ctx.store.as_ref(), &ctx.knowledge, deal_id, ctx.now)
                .await?
        else {
            return Ok(ToolOutcome::clarify(format!(
                "I couldn't find deal #{deal_id}. {ASK_FOR_DEAL}"
            )));
        };

        let mut text = format!(
            "Deal #{} has a {}% chance of closing ({} confidence).",
            estimate.deal_id,
            estimate.percentage(),
            estimate.confidence.label()
        );
        if !estimate.recommendations.is_empty() {
            text.push_str("\n\nRecommendations:\n");
            for recommendation in &estimate.recommendations {
                text.push_str(&format!("• {recommendation}\n"));
            }
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "probability": estimate })))
    }
}

impl DealProbability {
    /// Either the single open deal of the mentioned contact, or the question
    /// to ask instead.
    async fn deal_for_contact(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<Result<DealId, String>, ToolError> {
        let contacts = ctx.store.list_contacts(&ContactFilter::default()).await?;
        let contact = match resolve_contact_mentions(entities, &contacts) {
            Resolution::Unique(contact) => contact,
            Resolution::Ambiguous(candidates) => return Ok(Err(which_contact(&candidates))),
            Resolution::NotFound => return Ok(Err(ASK_FOR_DEAL.to_string())),
        };

        let deals = ctx
            .store
            .list_deals(&DealFilter { contact_id: Some(contact.id), ..DealFilter::default() })
            .await?;
        let open: Vec<&Deal> = deals.iter().filter(|deal| deal.status.is_open()).collect();
        match open.as_slice() {
            [deal] => Ok(Ok(deal.id)),
            [] => Ok(Err(format!("{} has no open deals. Which deal do you mean?", contact.name))),
            several => {
                let ids: Vec<String> = several.iter().map(|deal| format!("#{}", deal.id)).collect();
                Ok(Err(format!(
                    "{} has several open deals ({}). Which one do you mean?",
                    contact.name,
                    ids.join(", ")
                )))
            }
        }
    }
}

/// Reads "deal 12", "deal #12", "#12" or a lone "12".
fn deal_number(mention: &str) -> Option<DealId> {
    if let Some(rest) = mention.trim().strip_prefix('#') {
        if let Ok(id) = rest.trim().parse::<i64>() {
            return Some(DealId(id));
        }
    }
    let normalized = normalize_mention(mention);
    let tokens: Vec<&str> = normalized.split(' ').collect();
    let number = match tokens.as_slice() {
        [single] => single.parse::<i64>().ok(),
        _ => tokens
            .windows(2)
            .find(|pair| pair[0] == "deal")
            .and_then(|pair| pair[1].parse::<i64>().ok()),
    };
    number.map(DealId)
}
