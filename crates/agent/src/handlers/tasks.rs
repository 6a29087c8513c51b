use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;
use tracing::info;

use aura_core::domain::task::{NewTask, TaskPriority};
use aura_core::store::ContactFilter;

use super::resolve_contact_mentions;
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::workflows;

const TITLE_MAX_CHARS: usize = 100;
const DEFAULT_DUE_DAYS: i64 = 7;

pub struct CreateTask;

#[async_trait]
impl Tool for CreateTask {
    fn intent(&self) -> Intent {
        Intent::CreateTask
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let description = super::joined(entities);
        if description.is_empty() {
            return Ok(ToolOutcome::clarify("Please provide a task description."));
        }

        // Link the task to a contact only when the description names exactly one.
        let contacts = ctx.store.list_contacts(&ContactFilter::default()).await?;
        let contact_id =
            resolve_contact_mentions(entities, &contacts).unique().map(|contact| contact.id);

        let title: String = description.chars().take(TITLE_MAX_CHARS).collect();
        let task = ctx
            .store
            .create_task(NewTask {
                title: title.clone(),
                description: Some(description),
                priority: TaskPriority::Medium,
                contact_id,
                property_id: None,
                due_date: Some(ctx.now + Duration::days(DEFAULT_DUE_DAYS)),
                created_date: ctx.now,
            })
            .await?;

        info!(
            event_name = "agent.tool.task_created",
            correlation_id = %ctx.correlation_id,
            task_id = task.id.0,
            "task created from chat"
        );
        Ok(ToolOutcome::answer(format!("Task created successfully: '{title}'"), json!({ "task": task })))
    }
}

pub struct OverdueTasks;

#[async_trait]
impl Tool for OverdueTasks {
    fn intent(&self) -> Intent {
        Intent::OverdueTasks
    }

    async fn execute(
        &self,
        _entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let overdue = workflows::overdue(ctx.store.as_ref(), ctx.now).await?;
        if overdue.is_empty() {
            return Ok(ToolOutcome::answer("No overdue tasks. Nice work!", json!({ "tasks": [] })));
        }

        let mut text = format!("You have {} overdue tasks:\n\n", overdue.len());
        for task in &overdue {
            text.push_str(&format!(
                "• {} - {} days overdue (due {})\n",
                task.title,
                task.days_overdue,
                task.due_date.format("%Y-%m-%d")
            ));
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "tasks": overdue })))
    }
}
