//! Store-backed compositions of the scoring engine, shared by the tool
//! handlers and the HTTP surface. Each call reads a fresh snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use aura_core::analytics::{
    crm_snapshot, market_insights, performance_metrics, CrmSnapshot, MarketInsights,
    PerformanceMetrics,
};
use aura_core::automation::{daily_briefing, overdue_tasks, DailyBriefing, OverdueTask};
use aura_core::domain::contact::{Contact, ContactId};
use aura_core::domain::deal::DealId;
use aura_core::domain::property::Property;
use aura_core::knowledge::KnowledgeBase;
use aura_core::scoring::lead::engagement_index;
use aura_core::scoring::{
    BuyerMatch, BuyerMatcher, DealEstimator, DealProbability, FollowUpPolicy, FollowUpTask,
    LeadScoreResult, LeadScorer,
};
use aura_core::store::{
    ContactFilter, CrmStore, DealFilter, PropertyFilter, RelationshipFilter, StoreError,
    TaskFilter,
};

/// Scores every contact, ranked. With `persist`, each result replaces the
/// stored score for its contact.
pub async fn score_leads(
    store: &dyn CrmStore,
    knowledge: &KnowledgeBase,
    now: DateTime<Utc>,
    persist: bool,
) -> Result<Vec<LeadScoreResult>, StoreError> {
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    let links = store.list_relationships(&RelationshipFilter::default()).await?;
    let tasks = store.list_tasks(&TaskFilter::default()).await?;

    let engagement = engagement_index(&contacts, &links, &tasks);
    let ranked = LeadScorer::new(knowledge).rank(&contacts, &engagement, now);

    for result in ranked.iter().filter(|result| !result.defaults_applied.is_empty()) {
        warn!(
            event_name = "scoring.lead.defaults_applied",
            contact_id = result.contact_id.0,
            fields = ?result.defaults_applied,
            "scored contact with documented defaults"
        );
    }

    if persist {
        for result in &ranked {
            store.upsert_lead_score(result.to_record(now)).await?;
        }
        info!(event_name = "scoring.lead.persisted", contacts = ranked.len(), "lead scores persisted");
    }
    Ok(ranked)
}

/// Fresh score for one contact, using that contact's links and tasks.
pub async fn score_contact(
    store: &dyn CrmStore,
    knowledge: &KnowledgeBase,
    contact: &Contact,
    now: DateTime<Utc>,
) -> Result<LeadScoreResult, StoreError> {
    let links = store
        .list_relationships(&RelationshipFilter {
            contact_id: Some(contact.id),
            ..RelationshipFilter::default()
        })
        .await?;
    let tasks = store
        .list_tasks(&TaskFilter { contact_id: Some(contact.id), ..TaskFilter::default() })
        .await?;
    let engagement = engagement_index(std::slice::from_ref(contact), &links, &tasks);
    Ok(LeadScorer::new(knowledge).score(contact, engagement.get(&contact.id).copied(), now))
}

pub async fn follow_ups(
    store: &dyn CrmStore,
    policy: &FollowUpPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<FollowUpTask>, StoreError> {
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    Ok(policy.prioritize(&contacts, now))
}

pub async fn buyers_for_property(
    store: &dyn CrmStore,
    knowledge: &KnowledgeBase,
    property: &Property,
    now: DateTime<Utc>,
) -> Result<Vec<BuyerMatch>, StoreError> {
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    let links = store.list_relationships(&RelationshipFilter::default()).await?;
    let tasks = store.list_tasks(&TaskFilter::default()).await?;

    let engagement = engagement_index(&contacts, &links, &tasks);
    let scorer = LeadScorer::new(knowledge);
    let lead_scores: HashMap<ContactId, u8> = contacts
        .iter()
        .map(|contact| {
            (contact.id, scorer.score(contact, engagement.get(&contact.id).copied(), now).score)
        })
        .collect();

    Ok(BuyerMatcher::new(knowledge).find_buyers(property, &contacts, &links, &lead_scores))
}

/// `Ok(None)` when the deal does not exist. A deal whose contact is missing
/// is reported as `NotFound`.
pub async fn deal_probability(
    store: &dyn CrmStore,
    knowledge: &KnowledgeBase,
    deal_id: DealId,
    now: DateTime<Utc>,
) -> Result<Option<DealProbability>, StoreError> {
    let Some(deal) = store.get_deal(deal_id).await? else {
        return Ok(None);
    };
    let contact = store.get_contact(deal.contact_id).await?.ok_or_else(|| {
        StoreError::NotFound(format!("contact {} for deal {}", deal.contact_id, deal.id))
    })?;
    let lead = score_contact(store, knowledge, &contact, now).await?;
    Ok(Some(DealEstimator::new(knowledge).estimate(&deal, &contact, lead.score, now)))
}

pub async fn briefing(
    store: &dyn CrmStore,
    policy: &FollowUpPolicy,
    now: DateTime<Utc>,
) -> Result<DailyBriefing, StoreError> {
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    let tasks = store.list_tasks(&TaskFilter::open()).await?;
    let properties = store.list_properties(&PropertyFilter::default()).await?;
    Ok(daily_briefing(policy, &contacts, &tasks, &properties, now))
}

pub async fn overdue(store: &dyn CrmStore, now: DateTime<Utc>) -> Result<Vec<OverdueTask>, StoreError> {
    let tasks = store.list_tasks(&TaskFilter { due_before: Some(now), ..TaskFilter::open() }).await?;
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    let properties = store.list_properties(&PropertyFilter::default()).await?;
    Ok(overdue_tasks(&tasks, &contacts, &properties, now))
}

pub async fn market(store: &dyn CrmStore, area: Option<&str>) -> Result<MarketInsights, StoreError> {
    let properties = store.list_properties(&PropertyFilter::available()).await?;
    Ok(market_insights(&properties, area))
}

/// Portfolio summary for grounding generated answers.
pub async fn snapshot(store: &dyn CrmStore) -> Result<CrmSnapshot, StoreError> {
    let properties = store.list_properties(&PropertyFilter::default()).await?;
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    let deals = store.list_deals(&DealFilter::default()).await?;
    let tasks = store.list_tasks(&TaskFilter::default()).await?;
    Ok(crm_snapshot(&properties, &contacts, &deals, &tasks))
}

pub async fn performance(
    store: &dyn CrmStore,
    now: DateTime<Utc>,
) -> Result<PerformanceMetrics, StoreError> {
    let contacts = store.list_contacts(&ContactFilter::default()).await?;
    let deals = store.list_deals(&DealFilter::default()).await?;
    let tasks = store.list_tasks(&TaskFilter::default()).await?;
    Ok(performance_metrics(&contacts, &deals, &tasks, now))
}
