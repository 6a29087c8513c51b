//! Storage port consumed by the decision core.
//!
//! The core never issues SQL. Handlers and the scoring pipeline talk to a
//! [`CrmStore`], and the `aura-db` crate provides SQLite and in-memory
//! implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::contact::{Contact, ContactId, LeadStatus};
use crate::domain::deal::{Deal, DealId, DealStatus};
use crate::domain::lead_score::LeadScore;
use crate::domain::property::{Property, PropertyId, PropertyStatus};
use crate::domain::relationship::{ContactProperty, RelationshipKind};
use crate::domain::task::{NewTask, NewViewing, Task, TaskStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Empty filter lists mean "no restriction".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactFilter {
    pub statuses: Vec<LeadStatus>,
    pub name_contains: Option<String>,
}

impl ContactFilter {
    pub fn with_statuses(statuses: &[LeadStatus]) -> Self {
        Self { statuses: statuses.to_vec(), ..Self::default() }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&contact.effective_status()) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            if !contact.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyFilter {
    pub statuses: Vec<PropertyStatus>,
    pub area: Option<String>,
    pub property_type: Option<String>,
    pub min_bedrooms: Option<u8>,
    pub max_price: Option<Decimal>,
    pub building: Option<String>,
}

impl PropertyFilter {
    pub fn available() -> Self {
        Self { statuses: vec![PropertyStatus::Available], ..Self::default() }
    }

    pub fn matches(&self, property: &Property) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&property.status) {
            return false;
        }
        if let Some(area) = &self.area {
            let hit = property
                .area
                .as_deref()
                .map(|value| value.to_lowercase().contains(&area.to_lowercase()))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        if let Some(kind) = &self.property_type {
            let hit = property
                .property_type
                .as_deref()
                .map(|value| value.eq_ignore_ascii_case(kind))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        if let Some(min_bedrooms) = self.min_bedrooms {
            if property.bedrooms.map(|value| value < min_bedrooms).unwrap_or(true) {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if property.price.map(|value| value > max_price).unwrap_or(true) {
                return false;
            }
        }
        if let Some(building) = &self.building {
            if !property.building.to_lowercase().contains(&building.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DealFilter {
    pub statuses: Vec<DealStatus>,
    pub contact_id: Option<ContactId>,
    pub property_id: Option<PropertyId>,
}

impl DealFilter {
    pub fn matches(&self, deal: &Deal) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&deal.status))
            && self.contact_id.map(|id| id == deal.contact_id).unwrap_or(true)
            && self.property_id.map(|id| id == deal.property_id).unwrap_or(true)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipFilter {
    pub contact_id: Option<ContactId>,
    pub property_id: Option<PropertyId>,
    pub kinds: Vec<RelationshipKind>,
}

impl RelationshipFilter {
    pub fn for_property(property_id: PropertyId) -> Self {
        Self { property_id: Some(property_id), ..Self::default() }
    }

    pub fn matches(&self, link: &ContactProperty) -> bool {
        self.contact_id.map(|id| id == link.contact_id).unwrap_or(true)
            && self.property_id.map(|id| id == link.property_id).unwrap_or(true)
            && (self.kinds.is_empty() || self.kinds.contains(&link.relationship))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    pub contact_id: Option<ContactId>,
    pub due_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn open() -> Self {
        Self { statuses: vec![TaskStatus::Pending, TaskStatus::InProgress], ..Self::default() }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if self.contact_id.is_some() && self.contact_id != task.contact_id {
            return false;
        }
        if let Some(cutoff) = self.due_before {
            if task.due_date.map(|due| due >= cutoff).unwrap_or(true) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>, StoreError>;
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, StoreError>;
    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>, StoreError>;
    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, StoreError>;
    async fn get_deal(&self, id: DealId) -> Result<Option<Deal>, StoreError>;
    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, StoreError>;
    /// Replaces the whole score record for the contact.
    async fn upsert_lead_score(&self, score: LeadScore) -> Result<(), StoreError>;
    async fn get_lead_score(&self, id: ContactId) -> Result<Option<LeadScore>, StoreError>;
    async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> Result<Vec<ContactProperty>, StoreError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;
    /// Writes the viewing task and its link together. An identical link
    /// already on file is kept as is.
    async fn schedule_viewing(&self, viewing: NewViewing) -> Result<Task, StoreError>;
    /// Sets `last_contacted_date`. Fails with `NotFound` for unknown contacts.
    async fn mark_contacted(&self, id: ContactId, at: DateTime<Utc>) -> Result<(), StoreError>;
}
