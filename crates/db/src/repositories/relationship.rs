use aura_core::domain::contact::ContactId;
use aura_core::domain::property::PropertyId;
use aura_core::domain::relationship::{ContactProperty, RelationshipKind};

use super::{column, decode_rows, RepositoryError};
use crate::DbPool;

/// Inserting a link that already exists is a no-op.
pub(crate) const INSERT_LINK_SQL: &str =
    "INSERT INTO contact_properties (contact_id, property_id, relationship_type, created_date)
     VALUES (?, ?, ?, datetime('now'))
     ON CONFLICT(contact_id, property_id, relationship_type) DO NOTHING";

pub struct SqlRelationshipRepository {
    pool: DbPool,
}

impl SqlRelationshipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<ContactProperty>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, contact_id, property_id, relationship_type
             FROM contact_properties ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_rows(&rows, "contact_properties", row_to_link))
    }

    pub async fn save(&self, link: &ContactProperty) -> Result<(), RepositoryError> {
        sqlx::query(INSERT_LINK_SQL)
            .bind(link.contact_id.0)
            .bind(link.property_id.0)
            .bind(link.relationship.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_link(row: &sqlx::sqlite::SqliteRow) -> Result<ContactProperty, RepositoryError> {
    let kind: String = column(row, "relationship_type")?;
    Ok(ContactProperty {
        contact_id: ContactId(column(row, "contact_id")?),
        property_id: PropertyId(column(row, "property_id")?),
        relationship: RelationshipKind::parse(&kind),
    })
}
