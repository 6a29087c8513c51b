use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use aura_core::domain::contact::{Contact, ContactId, LeadStatus};
use aura_core::domain::deal::{Deal, DealId, DealStatus};
use aura_core::domain::property::{Property, PropertyId, PropertyStatus};
use aura_core::domain::relationship::{ContactProperty, RelationshipKind};
use aura_core::domain::task::{Task, TaskId, TaskPriority, TaskStatus};

use crate::connection::DbPool;
use crate::repositories::{
    RepositoryError, SqlContactRepository, SqlDealRepository, SqlPropertyRepository,
    SqlRelationshipRepository, SqlTaskRepository,
};

/// Demo portfolio used by `aura seed`, the server smoke tests and the
/// store integration tests. Dates are relative to `now` so the follow-up
/// and overdue views always have something to show.
#[derive(Clone, Debug)]
pub struct SampleDataset {
    pub properties: Vec<Property>,
    pub contacts: Vec<Contact>,
    pub deals: Vec<Deal>,
    pub tasks: Vec<Task>,
    pub links: Vec<ContactProperty>,
}

impl SampleDataset {
    pub fn build(now: DateTime<Utc>) -> Self {
        let properties = vec![
            property(1, "Shoreline Apartments", "101", "Apartment", 2, 3, 1580.0, 2_500_000, PropertyStatus::Available),
            property(2, "Garden Homes", "Villa 42", "Villa", 4, 5, 5000.0, 12_000_000, PropertyStatus::Available),
            property(3, "The Palm Tower", "3401", "Apartment", 1, 2, 1050.0, 3_500_000, PropertyStatus::Sold),
        ];

        let contacts = vec![
            contact(
                1,
                "Ahmed Al Futtaim",
                "ahmed.f@email.com",
                "+971501234567",
                LeadStatus::Hot,
                "AI Assistant",
                "Cash buyer looking for a 4 bedroom villa in Palm Jumeirah, budget 15M. Urgent.",
                now - Duration::days(2),
                now - Duration::days(40),
            ),
            contact(
                2,
                "Fatima Al Habtoor",
                "fatima.h@email.com",
                "+971559876543",
                LeadStatus::Warm,
                "Referral",
                "Interested in a 2br apartment in Palm Jumeirah, budget around 3m.",
                now - Duration::days(10),
                now - Duration::days(25),
            ),
            contact(
                3,
                "John Smith",
                "john.s@email.com",
                "+442071234567",
                LeadStatus::Cold,
                "Website",
                "Owner of The Palm Tower 3401.",
                now - Duration::days(30),
                now - Duration::days(90),
            ),
        ];

        let deals = vec![Deal {
            id: DealId(1),
            contact_id: ContactId(1),
            property_id: PropertyId(2),
            deal_type: Some("Sale".to_owned()),
            status: DealStatus::Active,
            deal_value: Decimal::new(12_000_000, 0),
            commission: Some(Decimal::new(240_000, 0)),
            created_date: Some(now - Duration::days(12)),
            closing_date: None,
        }];

        let viewing_at = now
            .date_naive()
            .and_hms_opt(16, 0, 0)
            .map(|at| at.and_utc())
            .unwrap_or(now);
        let tasks = vec![
            task(
                1,
                "Follow up with Ahmed Al Futtaim",
                "Discuss the Garden Home on Frond C.",
                TaskPriority::High,
                Some(1),
                Some(2),
                now,
                now + Duration::days(1),
            ),
            task(
                2,
                "Prepare CMA for Fatima Al Habtoor",
                "She is interested in Shoreline apartments.",
                TaskPriority::Medium,
                Some(2),
                Some(1),
                now - Duration::days(5),
                now - Duration::days(2),
            ),
            task(
                3,
                "Viewing with Fatima Al Habtoor",
                "Shoreline Apartments unit 101.",
                TaskPriority::High,
                Some(2),
                Some(1),
                now - Duration::days(1),
                viewing_at,
            ),
        ];

        let links = vec![
            link(3, 3, RelationshipKind::Owner),
            link(1, 2, RelationshipKind::Interested),
            link(2, 1, RelationshipKind::ViewingScheduled),
        ];

        Self { properties, contacts, deals, tasks, links }
    }

    /// Upserts every record by id, so loading twice leaves one copy.
    pub async fn load(&self, pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let properties = SqlPropertyRepository::new(pool.clone());
        for property in &self.properties {
            properties.save(property).await?;
        }
        let contacts = SqlContactRepository::new(pool.clone());
        for contact in &self.contacts {
            contacts.save(contact).await?;
        }
        let deals = SqlDealRepository::new(pool.clone());
        for deal in &self.deals {
            deals.save(deal).await?;
        }
        let tasks = SqlTaskRepository::new(pool.clone());
        for task in &self.tasks {
            tasks.save(task).await?;
        }
        let relationships = SqlRelationshipRepository::new(pool.clone());
        for link in &self.links {
            relationships.save(link).await?;
        }

        let result = SeedResult {
            properties: self.properties.len(),
            contacts: self.contacts.len(),
            deals: self.deals.len(),
            tasks: self.tasks.len(),
            links: self.links.len(),
        };
        info!(
            event_name = "db.seed.loaded",
            properties = result.properties,
            contacts = result.contacts,
            deals = result.deals,
            tasks = result.tasks,
            links = result.links,
            "sample dataset loaded"
        );
        Ok(result)
    }

    /// Checks that every seeded id is present in its table.
    pub async fn verify(&self, pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();
        checks.push(("properties", ids_present(pool, "properties", self.properties.iter().map(|p| p.id.0)).await?));
        checks.push(("contacts", ids_present(pool, "contacts", self.contacts.iter().map(|c| c.id.0)).await?));
        checks.push(("deals", ids_present(pool, "deals", self.deals.iter().map(|d| d.id.0)).await?));
        checks.push(("tasks", ids_present(pool, "tasks", self.tasks.iter().map(|t| t.id.0)).await?));

        let link_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_properties")
            .fetch_one(pool)
            .await?;
        checks.push(("contact_properties", link_count as usize >= self.links.len()));

        Ok(VerificationResult { all_present: checks.iter().all(|(_, ok)| *ok), checks })
    }

    /// Removes every CRM record, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        for table in ["lead_scores", "contact_properties", "tasks", "deals", "contacts", "properties"] {
            sqlx::query(&format!("DELETE FROM {table}")).execute(pool).await?;
        }
        Ok(())
    }
}

async fn ids_present(
    pool: &DbPool,
    table: &str,
    ids: impl Iterator<Item = i64>,
) -> Result<bool, RepositoryError> {
    for id in ids {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id = ?"))
            .bind(id)
            .fetch_one(pool)
            .await?;
        if count != 1 {
            return Ok(false);
        }
    }
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn property(
    id: i64,
    building: &str,
    unit: &str,
    property_type: &str,
    bedrooms: u8,
    bathrooms: u8,
    size_sqft: f64,
    price: i64,
    status: PropertyStatus,
) -> Property {
    Property {
        area: Some("Palm Jumeirah".to_owned()),
        property_type: Some(property_type.to_owned()),
        bedrooms: Some(bedrooms),
        bathrooms: Some(bathrooms),
        size_sqft: Some(size_sqft),
        price: Some(Decimal::new(price, 0)),
        status,
        ..Property::new(id, building, unit)
    }
}

#[allow(clippy::too_many_arguments)]
fn contact(
    id: i64,
    name: &str,
    email: &str,
    phone: &str,
    status: LeadStatus,
    source: &str,
    notes: &str,
    last_contacted: DateTime<Utc>,
    created: DateTime<Utc>,
) -> Contact {
    Contact {
        email: Some(email.to_owned()),
        phone: Some(phone.to_owned()),
        source: Some(source.to_owned()),
        notes: Some(notes.to_owned()),
        last_contacted_date: Some(last_contacted),
        created_date: Some(created),
        ..Contact::new(id, name, status)
    }
}

#[allow(clippy::too_many_arguments)]
fn task(
    id: i64,
    title: &str,
    description: &str,
    priority: TaskPriority,
    contact_id: Option<i64>,
    property_id: Option<i64>,
    created: DateTime<Utc>,
    due: DateTime<Utc>,
) -> Task {
    Task {
        id: TaskId(id),
        title: title.to_owned(),
        description: Some(description.to_owned()),
        status: TaskStatus::Pending,
        priority,
        contact_id: contact_id.map(ContactId),
        property_id: property_id.map(PropertyId),
        created_date: Some(created),
        due_date: Some(due),
        completed_date: None,
    }
}

fn link(contact_id: i64, property_id: i64, relationship: RelationshipKind) -> ContactProperty {
    ContactProperty {
        contact_id: ContactId(contact_id),
        property_id: PropertyId(property_id),
        relationship,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub properties: usize,
    pub contacts: usize,
    pub deals: usize,
    pub tasks: usize,
    pub links: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
