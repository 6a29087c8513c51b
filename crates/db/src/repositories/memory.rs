use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use aura_core::domain::contact::{Contact, ContactId};
use aura_core::domain::deal::{Deal, DealId};
use aura_core::domain::lead_score::LeadScore;
use aura_core::domain::property::{Property, PropertyId};
use aura_core::domain::relationship::ContactProperty;
use aura_core::domain::task::{NewTask, NewViewing, Task, TaskId, TaskStatus};
use aura_core::store::{
    ContactFilter, CrmStore, DealFilter, PropertyFilter, RelationshipFilter, StoreError,
    TaskFilter,
};

/// Store backed by ordered maps. Used by tests and the offline CLI demo.
#[derive(Default)]
pub struct InMemoryCrmStore {
    contacts: RwLock<BTreeMap<ContactId, Contact>>,
    properties: RwLock<BTreeMap<PropertyId, Property>>,
    deals: RwLock<BTreeMap<DealId, Deal>>,
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    links: RwLock<Vec<ContactProperty>>,
    lead_scores: RwLock<BTreeMap<ContactId, LeadScore>>,
    unavailable: AtomicBool,
}

impl InMemoryCrmStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call fails with `StoreError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.contacts.write().await.insert(contact.id, contact);
    }

    pub async fn insert_property(&self, property: Property) {
        self.properties.write().await.insert(property.id, property);
    }

    pub async fn insert_deal(&self, deal: Deal) {
        self.deals.write().await.insert(deal.id, deal);
    }

    pub async fn insert_task(&self, task: Task) {
        self.tasks.write().await.insert(task.id, task);
    }

    pub async fn link(&self, link: ContactProperty) {
        let mut links = self.links.write().await;
        if !links.contains(&link) {
            links.push(link);
        }
    }

    async fn insert_new_task(&self, task: NewTask) -> Task {
        let mut tasks = self.tasks.write().await;
        let next_id = tasks.keys().next_back().map(|id| id.0 + 1).unwrap_or(1);
        let created = Task {
            id: TaskId(next_id),
            title: task.title,
            description: task.description,
            status: TaskStatus::Pending,
            priority: task.priority,
            contact_id: task.contact_id,
            property_id: task.property_id,
            created_date: Some(task.created_date),
            due_date: task.due_date,
            completed_date: None,
        };
        tasks.insert(created.id, created.clone());
        created
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CrmStore for InMemoryCrmStore {
    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        self.check()?;
        Ok(self.contacts.read().await.get(&id).cloned())
    }

    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StoreError> {
        self.check()?;
        let contacts = self.contacts.read().await;
        Ok(contacts.values().filter(|contact| filter.matches(contact)).cloned().collect())
    }

    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>, StoreError> {
        self.check()?;
        Ok(self.properties.read().await.get(&id).cloned())
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, StoreError> {
        self.check()?;
        let properties = self.properties.read().await;
        Ok(properties.values().filter(|property| filter.matches(property)).cloned().collect())
    }

    async fn get_deal(&self, id: DealId) -> Result<Option<Deal>, StoreError> {
        self.check()?;
        Ok(self.deals.read().await.get(&id).cloned())
    }

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, StoreError> {
        self.check()?;
        let deals = self.deals.read().await;
        Ok(deals.values().filter(|deal| filter.matches(deal)).cloned().collect())
    }

    async fn upsert_lead_score(&self, score: LeadScore) -> Result<(), StoreError> {
        self.check()?;
        self.lead_scores.write().await.insert(score.contact_id, score);
        Ok(())
    }

    async fn get_lead_score(&self, id: ContactId) -> Result<Option<LeadScore>, StoreError> {
        self.check()?;
        Ok(self.lead_scores.read().await.get(&id).cloned())
    }

    async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> Result<Vec<ContactProperty>, StoreError> {
        self.check()?;
        let links = self.links.read().await;
        Ok(links.iter().filter(|link| filter.matches(link)).cloned().collect())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.check()?;
        let tasks = self.tasks.read().await;
        Ok(tasks.values().filter(|task| filter.matches(task)).cloned().collect())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        self.check()?;
        Ok(self.insert_new_task(task).await)
    }

    async fn schedule_viewing(&self, viewing: NewViewing) -> Result<Task, StoreError> {
        self.check()?;
        let task = self.insert_new_task(viewing.task).await;
        self.link(viewing.link).await;
        Ok(task)
    }

    async fn mark_contacted(&self, id: ContactId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check()?;
        let mut contacts = self.contacts.write().await;
        let contact =
            contacts.get_mut(&id).ok_or_else(|| StoreError::NotFound(format!("contact {id}")))?;
        contact.last_contacted_date = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use aura_core::domain::contact::{Contact, ContactId, LeadStatus};
    use aura_core::domain::property::PropertyId;
    use aura_core::domain::relationship::{ContactProperty, RelationshipKind};
    use aura_core::domain::task::{NewTask, NewViewing, TaskPriority};
    use aura_core::store::{ContactFilter, CrmStore, RelationshipFilter, StoreError, TaskFilter};

    use super::InMemoryCrmStore;

    #[tokio::test]
    async fn lists_are_ordered_by_id_and_filtered() {
        let store = InMemoryCrmStore::new();
        store.insert_contact(Contact::new(3, "Omar Haddad", LeadStatus::Hot)).await;
        store.insert_contact(Contact::new(1, "Sara Khan", LeadStatus::Hot)).await;
        store.insert_contact(Contact::new(2, "John Smith", LeadStatus::Cold)).await;

        let hot = store
            .list_contacts(&ContactFilter::with_statuses(&[LeadStatus::Hot]))
            .await
            .expect("list");
        let ids: Vec<i64> = hot.iter().map(|contact| contact.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn create_task_allocates_next_id() {
        let store = InMemoryCrmStore::new();
        let created_date = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        let task = NewTask {
            title: "Call back".to_owned(),
            description: None,
            priority: TaskPriority::High,
            contact_id: None,
            property_id: None,
            due_date: None,
            created_date,
        };

        let first = store.create_task(task.clone()).await.expect("create");
        let second = store.create_task(task).await.expect("create");
        assert_eq!((first.id.0, second.id.0), (1, 2));
    }

    #[tokio::test]
    async fn scheduling_a_viewing_twice_keeps_one_link() {
        let store = InMemoryCrmStore::new();
        let created_date = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        let viewing = NewViewing {
            task: NewTask {
                title: "Property viewing: Garden Homes Unit Villa 42".to_owned(),
                description: None,
                priority: TaskPriority::High,
                contact_id: Some(ContactId(2)),
                property_id: Some(PropertyId(2)),
                due_date: Some(created_date + chrono::Duration::days(1)),
                created_date,
            },
            link: ContactProperty {
                contact_id: ContactId(2),
                property_id: PropertyId(2),
                relationship: RelationshipKind::ViewingScheduled,
            },
        };

        store.schedule_viewing(viewing.clone()).await.expect("first");
        store.schedule_viewing(viewing).await.expect("second");

        let links = store.list_relationships(&RelationshipFilter::default()).await.expect("links");
        assert_eq!(links.len(), 1);
        let tasks = store.list_tasks(&TaskFilter::open()).await.expect("tasks");
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn unavailable_flag_and_missing_contacts_surface_as_errors() {
        let store = InMemoryCrmStore::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        assert!(matches!(
            store.mark_contacted(ContactId(9), at).await,
            Err(StoreError::NotFound(_))
        ));

        store.set_unavailable(true);
        assert!(matches!(store.get_contact(ContactId(1)).await, Err(StoreError::Unavailable(_))));
    }
}
