use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use aura_core::domain::contact::ContactId;
use aura_core::domain::property::PropertyId;
use aura_core::scoring::{BuyerMatcher, LeadScorer};
use aura_core::store::{ContactFilter, CrmStore, RelationshipFilter};
use aura_core::KnowledgeBase;
use aura_db::{connect_with_settings, migrations, SampleDataset, SqlCrmStore};

async fn seeded_store() -> SqlCrmStore {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
    SampleDataset::build(now).load(&pool).await.expect("seed");
    SqlCrmStore::new(pool)
}

#[tokio::test]
async fn villa_buyers_rank_the_cash_buyer_first_and_skip_the_owner() {
    let store = seeded_store().await;
    let kb = KnowledgeBase::default();
    let villa = store.get_property(PropertyId(2)).await.expect("get").expect("villa");
    let contacts = store.list_contacts(&ContactFilter::default()).await.expect("contacts");
    let links = store
        .list_relationships(&RelationshipFilter::for_property(villa.id))
        .await
        .expect("links");

    let matches = BuyerMatcher::new(&kb).find_buyers(&villa, &contacts, &links, &HashMap::new());
    assert!(!matches.is_empty());
    assert_eq!(matches[0].contact_id, ContactId(1));
    assert!(matches.iter().all(|candidate| candidate.contact_id != ContactId(3)));
}

#[tokio::test]
async fn computed_scores_persist_and_replace() {
    let store = seeded_store().await;
    let kb = KnowledgeBase::default();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
    let contact = store.get_contact(ContactId(1)).await.expect("get").expect("contact");

    let result = LeadScorer::new(&kb).score(&contact, None, now);
    store.upsert_lead_score(result.to_record(now)).await.expect("upsert");
    store.upsert_lead_score(result.to_record(now)).await.expect("upsert again");

    let stored = store.get_lead_score(ContactId(1)).await.expect("get").expect("score");
    assert_eq!(stored.score, result.score);
    assert_eq!(stored.score_factors, result.factor_map());
}
