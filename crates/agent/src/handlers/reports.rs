use async_trait::async_trait;
use serde_json::json;

use aura_core::knowledge::KnowledgeBase;
use aura_core::resolve::normalize_mention;

use super::format_aed;
use crate::intent::Intent;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::workflows;

const TYPES_SHOWN: usize = 3;

pub struct MarketInsights;

#[async_trait]
impl Tool for MarketInsights {
    fn intent(&self) -> Intent {
        Intent::MarketInsights
    }

    async fn execute(
        &self,
        entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let area = known_area(&super::joined(entities), &ctx.knowledge).map(|area| title_case(&area));
        let insights = workflows::market(ctx.store.as_ref(), area.as_deref()).await?;

        if insights.total_properties == 0 {
            return Ok(ToolOutcome::answer(
                format!("There are no available listings in {} right now.", insights.area),
                json!({ "insights": insights }),
            ));
        }

        let mut text = format!("Market Analysis for {}:\n\n", insights.area);
        text.push_str(&format!("Total Properties: {}\n", insights.total_properties));
        if let Some(average) = insights.average_market_price {
            text.push_str(&format!("Average Price: {}\n", format_aed(average)));
        }
        if let Some(kind) = &insights.most_common_type {
            text.push_str(&format!("Most Common Type: {kind}\n"));
        }
        text.push_str("\nBy Property Type:\n");
        for insight in insights.property_types.iter().take(TYPES_SHOWN) {
            let average = insight.average_price.map(format_aed).unwrap_or_else(|| "n/a".to_string());
            text.push_str(&format!(
                "• {}: {} properties, Avg: {}\n",
                insight.property_type, insight.count, average
            ));
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "insights": insights })))
    }
}

pub struct Performance;

#[async_trait]
impl Tool for Performance {
    fn intent(&self) -> Intent {
        Intent::Performance
    }

    async fn execute(
        &self,
        _entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let metrics = workflows::performance(ctx.store.as_ref(), ctx.now).await?;
        let average_deal = metrics.average_deal_size.map(format_aed).unwrap_or_else(|| "n/a".to_string());

        let text = [
            "Performance Summary:\n".to_string(),
            format!("• Active Deals: {}", metrics.active_deals),
            format!("• Deals Closed (30 days): {}", metrics.deals_closed_30_days),
            format!("• Revenue (30 days): {}", format_aed(metrics.revenue_30_days)),
            format!("• Commission (30 days): {}", format_aed(metrics.commission_30_days)),
            format!("• Pipeline Value: {}", format_aed(metrics.pipeline_value)),
            format!("• Conversion Rate: {}%", metrics.conversion_rate),
            format!("• Average Deal Size: {average_deal}"),
            format!("• Task Completion Rate: {}%", metrics.task_completion_rate),
        ]
        .join("\n");
        Ok(ToolOutcome::answer(text, json!({ "metrics": metrics })))
    }
}

pub struct DailyBriefing;

#[async_trait]
impl Tool for DailyBriefing {
    fn intent(&self) -> Intent {
        Intent::DailyBriefing
    }

    async fn execute(
        &self,
        _entities: &[String],
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, ToolError> {
        let briefing = workflows::briefing(ctx.store.as_ref(), &ctx.follow_up_policy, ctx.now).await?;

        let mut text = format!("Daily Briefing for {}:\n\n{}\n", briefing.date, briefing.summary);
        if !briefing.urgent_follow_ups.is_empty() {
            text.push_str("\nUrgent Follow-ups:\n");
            for follow_up in &briefing.urgent_follow_ups {
                text.push_str(&format!(
                    "• {} ({} lead) - {:.1} days overdue\n",
                    follow_up.contact_name, follow_up.lead_status, follow_up.days_overdue
                ));
            }
        }
        if !briefing.urgent_overdue_tasks.is_empty() {
            text.push_str("\nOverdue Tasks:\n");
            for task in &briefing.urgent_overdue_tasks {
                text.push_str(&format!("• {} - {} days overdue\n", task.title, task.days_overdue));
            }
        }
        if !briefing.todays_viewings.is_empty() {
            text.push_str("\nToday's Viewings:\n");
            for viewing in &briefing.todays_viewings {
                let who = viewing.contact_name.as_deref().unwrap_or(viewing.title.as_str());
                match &viewing.property {
                    Some(property) => text.push_str(&format!(
                        "• {} - {} at {}\n",
                        who,
                        property,
                        viewing.due_date.format("%H:%M")
                    )),
                    None => text.push_str(&format!("• {} at {}\n", who, viewing.due_date.format("%H:%M"))),
                }
            }
        }
        Ok(ToolOutcome::answer(text.trim_end(), json!({ "briefing": briefing })))
    }
}

/// Longest knowledge-base area named in `text`, so "palm jumeirah" wins
/// over "jumeirah".
fn known_area(text: &str, knowledge: &KnowledgeBase) -> Option<String> {
    let padded = format!(" {} ", normalize_mention(text));
    let mut areas: Vec<&String> = knowledge.areas.iter().collect();
    areas.sort_by(|left, right| right.len().cmp(&left.len()));
    areas
        .into_iter()
        .find(|area| padded.contains(&format!(" {} ", normalize_mention(area))))
        .cloned()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use aura_core::knowledge::KnowledgeBase;

    use super::{known_area, title_case, DailyBriefing, MarketInsights, Performance};
    use crate::handlers::test_support::{context, entities};
    use crate::tools::{Tool, ToolOutcome};

    fn answer_text(outcome: ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Answer { text, .. } => text,
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[test]
    fn picks_the_longest_known_area() {
        let knowledge = KnowledgeBase::default();
        assert_eq!(known_area("prices in Palm Jumeirah?", &knowledge).as_deref(), Some("palm jumeirah"));
        assert_eq!(known_area("the whole city", &knowledge), None);
        assert_eq!(title_case("palm jumeirah"), "Palm Jumeirah");
    }

    #[tokio::test]
    async fn market_analysis_covers_available_listings_in_the_area() {
        let ctx = context().await;
        let text =
            answer_text(MarketInsights.execute(&entities(&["palm jumeirah"]), &ctx).await.expect("run"));
        assert!(text.starts_with("Market Analysis for Palm Jumeirah:"));
        assert!(text.contains("Total Properties: 2"));
        assert!(text.contains("• Villa: 1 properties, Avg: AED 12,000,000"));

        let empty = answer_text(MarketInsights.execute(&entities(&["deira"]), &ctx).await.expect("run"));
        assert_eq!(empty, "There are no available listings in Deira right now.");
    }

    #[tokio::test]
    async fn performance_summary_reports_the_pipeline() {
        let ctx = context().await;
        let text = answer_text(Performance.execute(&[], &ctx).await.expect("run"));
        assert!(text.contains("• Active Deals: 1"));
        assert!(text.contains("• Pipeline Value: AED 12,000,000"));
        assert!(text.contains("• Average Deal Size: n/a"));
    }

    #[tokio::test]
    async fn briefing_lists_urgent_work_and_viewings() {
        let ctx = context().await;
        let text = answer_text(DailyBriefing.execute(&[], &ctx).await.expect("run"));
        assert!(text.starts_with("Daily Briefing for 2026-03-01:"));
        assert!(text.contains("Urgent Follow-ups:"));
        assert!(text.contains("• Prepare CMA for Fatima Al Habtoor - 2 days overdue"));
        assert!(text.contains("Today's Viewings:\n• Fatima Al Habtoor"));
        assert!(text.contains("16:00"));
    }
}
