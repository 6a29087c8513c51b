use chrono::{DateTime, Utc};
use tracing::debug;

use aura_core::domain::contact::{Contact, ContactId};
use aura_core::domain::deal::{Deal, DealId};
use aura_core::domain::lead_score::LeadScore;
use aura_core::domain::property::{Property, PropertyId};
use aura_core::domain::relationship::ContactProperty;
use aura_core::domain::task::{NewTask, NewViewing, Task};
use aura_core::store::{
    ContactFilter, CrmStore, DealFilter, PropertyFilter, RelationshipFilter, StoreError,
    TaskFilter,
};

use crate::repositories::{
    SqlContactRepository, SqlDealRepository, SqlLeadScoreRepository, SqlPropertyRepository,
    SqlRelationshipRepository, SqlTaskRepository,
};
use crate::DbPool;

/// SQLite implementation of the core storage port. Lists are read in id
/// order and filtered after decoding.
pub struct SqlCrmStore {
    contacts: SqlContactRepository,
    properties: SqlPropertyRepository,
    deals: SqlDealRepository,
    tasks: SqlTaskRepository,
    relationships: SqlRelationshipRepository,
    lead_scores: SqlLeadScoreRepository,
}

impl SqlCrmStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            contacts: SqlContactRepository::new(pool.clone()),
            properties: SqlPropertyRepository::new(pool.clone()),
            deals: SqlDealRepository::new(pool.clone()),
            tasks: SqlTaskRepository::new(pool.clone()),
            relationships: SqlRelationshipRepository::new(pool.clone()),
            lead_scores: SqlLeadScoreRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl CrmStore for SqlCrmStore {
    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts.find_by_id(id).await?)
    }

    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StoreError> {
        let contacts = self.contacts.list().await?;
        Ok(contacts.into_iter().filter(|contact| filter.matches(contact)).collect())
    }

    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>, StoreError> {
        Ok(self.properties.find_by_id(id).await?)
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, StoreError> {
        let properties = self.properties.list().await?;
        Ok(properties.into_iter().filter(|property| filter.matches(property)).collect())
    }

    async fn get_deal(&self, id: DealId) -> Result<Option<Deal>, StoreError> {
        Ok(self.deals.find_by_id(id).await?)
    }

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, StoreError> {
        let deals = self.deals.list().await?;
        Ok(deals.into_iter().filter(|deal| filter.matches(deal)).collect())
    }

    async fn upsert_lead_score(&self, score: LeadScore) -> Result<(), StoreError> {
        debug!(
            event_name = "db.lead_score.upsert",
            contact_id = score.contact_id.0,
            score = score.score,
            "persisting lead score"
        );
        Ok(self.lead_scores.upsert(&score).await?)
    }

    async fn get_lead_score(&self, id: ContactId) -> Result<Option<LeadScore>, StoreError> {
        Ok(self.lead_scores.find(id).await?)
    }

    async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> Result<Vec<ContactProperty>, StoreError> {
        let links = self.relationships.list().await?;
        Ok(links.into_iter().filter(|link| filter.matches(link)).collect())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.list().await?;
        Ok(tasks.into_iter().filter(|task| filter.matches(task)).collect())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        Ok(self.tasks.create(task).await?)
    }

    async fn schedule_viewing(&self, viewing: NewViewing) -> Result<Task, StoreError> {
        debug!(
            event_name = "db.viewing.schedule",
            contact_id = viewing.link.contact_id.0,
            property_id = viewing.link.property_id.0,
            "persisting viewing"
        );
        Ok(self.tasks.schedule_viewing(viewing).await?)
    }

    async fn mark_contacted(&self, id: ContactId, at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(self.contacts.mark_contacted(id, at).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use aura_core::domain::contact::{ContactId, LeadStatus};
    use aura_core::domain::property::PropertyId;
    use aura_core::domain::relationship::RelationshipKind;
    use aura_core::store::{
        ContactFilter, CrmStore, PropertyFilter, RelationshipFilter, StoreError, TaskFilter,
    };

    use super::SqlCrmStore;
    use crate::fixtures::SampleDataset;
    use crate::{connect_with_settings, migrations};

    async fn seeded_store() -> SqlCrmStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        SampleDataset::build(now).load(&pool).await.expect("seed");
        SqlCrmStore::new(pool)
    }

    #[tokio::test]
    async fn filters_apply_after_decoding() {
        let store = seeded_store().await;

        let hot = store
            .list_contacts(&ContactFilter::with_statuses(&[LeadStatus::Hot]))
            .await
            .expect("contacts");
        assert!(hot.iter().all(|contact| contact.effective_status() == LeadStatus::Hot));
        assert!(!hot.is_empty());

        let available = store.list_properties(&PropertyFilter::available()).await.expect("props");
        assert!(available.iter().all(|property| property.is_available()));

        let owners = store
            .list_relationships(&RelationshipFilter {
                kinds: vec![RelationshipKind::Owner],
                ..RelationshipFilter::default()
            })
            .await
            .expect("links");
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].property_id, PropertyId(3));

        let open = store.list_tasks(&TaskFilter::open()).await.expect("tasks");
        assert!(open.iter().all(|task| task.status.is_open()));
    }

    #[tokio::test]
    async fn store_errors_map_from_repository_errors() {
        let store = seeded_store().await;
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid");
        let missing = store.mark_contacted(ContactId(404), at).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }
}
