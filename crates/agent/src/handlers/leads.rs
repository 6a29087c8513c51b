use async_trait::async_trait;
use serde_json::json;

use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::workflows;

const FOLLOW_UPS_SHOWN: usize = 5;
const LEADS_SHOWN: usize = 5;

pub struct FollowUps;

#[async_trait]
impl Tool for FollowUps {
    fn intent(&self) -> Intent {
        Intent::FollowUps
    }

    async fn execute(
        &self,
        _entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let due = workflows::follow_ups(ctx.store.as_ref(), &ctx.follow_up_policy, ctx.now).await?;
        if due.is_empty() {
            return Ok(ToolOutcome::answer(
                "You're all caught up! No follow-ups needed at this time.",
                json!({ "follow_ups": [] }),
            ));
        }

        let shown = &due[..due.len().min(FOLLOW_UPS_SHOWN)];
        let mut text = String::from("Here are your follow-up tasks:\n\n");
        for task in shown {
            text.push_str(&format!(
                "• {} ({} lead) - {:.1} days overdue\n",
                task.contact_name, task.lead_status, task.days_overdue
            ));
        }
        if due.len() > shown.len() {
            text.push_str(&format!("\n...and {} more.", due.len() - shown.len()));
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "follow_ups": due })))
    }
}

/// Rescores every contact and persists the results before answering.
pub struct LeadScores;

#[async_trait]
impl Tool for LeadScores {
    fn intent(&self) -> Intent {
        Intent::LeadScores
    }

    async fn execute(
        &self,
        _entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let ranked =
            workflows::score_leads(ctx.store.as_ref(), &ctx.knowledge, ctx.now, true).await?;
        if ranked.is_empty() {
            return Ok(ToolOutcome::answer("There are no contacts to score yet.", json!({ "leads": [] })));
        }

        let mut text = String::from("Top leads by score:\n\n");
        for lead in ranked.iter().take(LEADS_SHOWN) {
            text.push_str(&format!(
                "• {}: {}/100 ({} priority)\n",
                lead.contact_name,
                lead.score,
                lead.priority.label()
            ));
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "leads": ranked })))
    }
}
