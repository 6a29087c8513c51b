use aura_agent::workflows;
use aura_core::scoring::LeadScoreResult;
use aura_core::KnowledgeBase;
use aura_db::SqlCrmStore;
use chrono::Utc;

use crate::commands::{finish, open_database, prepare, CommandResult};

pub fn run(persist: bool) -> CommandResult {
    let (config, runtime) = match prepare("leads") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let knowledge = KnowledgeBase::load_or_default(config.knowledge.path.as_deref())
            .map_err(|error| ("knowledge", error.to_string(), 7u8))?;
        let pool = open_database(&config).await?;
        let store = SqlCrmStore::new(pool.clone());

        let ranked = workflows::score_leads(&store, &knowledge, Utc::now(), persist)
            .await
            .map_err(|error| ("data_unavailable", error.to_string(), 4u8))?;
        pool.close().await;

        Ok(render(&ranked, persist))
    });

    finish("leads", result)
}

fn render(ranked: &[LeadScoreResult], persist: bool) -> String {
    if ranked.is_empty() {
        return "no contacts to score".to_string();
    }

    let mut lines = vec![format!(
        "scored {} contacts{}:",
        ranked.len(),
        if persist { " (persisted)" } else { "" }
    )];
    lines.extend(ranked.iter().enumerate().map(|(index, result)| {
        format!(
            "{}. {} - {}/100 ({} priority, {} lead)",
            index + 1,
            result.contact_name,
            result.score,
            result.priority.label(),
            result.lead_status.as_str()
        )
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use aura_core::scoring::PriorityLevel;
    use aura_core::{ContactId, LeadStatus};

    use super::{render, LeadScoreResult};

    fn result(name: &str, score: u8, status: LeadStatus) -> LeadScoreResult {
        LeadScoreResult {
            contact_id: ContactId(1),
            contact_name: name.to_string(),
            lead_status: status,
            last_contacted_date: None,
            score,
            factors: Vec::new(),
            priority: PriorityLevel::from_score(score),
            recommendations: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    #[test]
    fn renders_ranked_lines() {
        let ranked = vec![result("Ahmed", 84, LeadStatus::Hot), result("John", 41, LeadStatus::Cold)];
        assert_eq!(
            render(&ranked, true),
            "scored 2 contacts (persisted):\n1. Ahmed - 84/100 (High priority, Hot lead)\n\
             2. John - 41/100 (Low priority, Cold lead)"
        );
    }

    #[test]
    fn empty_ranking_says_so() {
        assert_eq!(render(&[], false), "no contacts to score");
    }
}
