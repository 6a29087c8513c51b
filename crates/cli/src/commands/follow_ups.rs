use aura_agent::workflows;
use aura_core::scoring::FollowUpTask;
use aura_db::SqlCrmStore;
use chrono::Utc;

use crate::commands::{finish, open_database, prepare, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("follow-ups") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let store = SqlCrmStore::new(pool.clone());
        let policy = config.scoring.follow_up_policy();

        let due = workflows::follow_ups(&store, &policy, Utc::now())
            .await
            .map_err(|error| ("data_unavailable", error.to_string(), 4u8))?;
        pool.close().await;

        Ok(render(&due))
    });

    finish("follow-ups", result)
}

fn render(due: &[FollowUpTask]) -> String {
    if due.is_empty() {
        return "no follow-ups due".to_string();
    }

    let mut lines = vec![format!("{} follow-ups due:", due.len())];
    lines.extend(due.iter().map(|task| {
        format!(
            "- {} ({} lead) {:.1} days overdue, priority {:.1}: {}",
            task.contact_name,
            task.lead_status.as_str(),
            task.days_overdue,
            task.priority,
            task.reason
        )
    }));
    lines.join("\n")
}
