use aura_core::domain::contact::ContactId;
use aura_core::domain::deal::{Deal, DealId, DealStatus};
use aura_core::domain::property::PropertyId;

use super::{column, decode_rows, optional_money, optional_timestamp, parse_money, RepositoryError};
use crate::DbPool;

const DEAL_COLUMNS: &str = "id, contact_id, property_id, deal_type, status, deal_value,
     commission, created_date, closing_date";

pub struct SqlDealRepository {
    pool: DbPool,
}

impl SqlDealRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_deal(r)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<Deal>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(&rows, "deals", row_to_deal))
    }

    pub async fn save(&self, deal: &Deal) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO deals (id, contact_id, property_id, deal_type, status, deal_value,
                                commission, created_date, closing_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 contact_id = excluded.contact_id,
                 property_id = excluded.property_id,
                 deal_type = excluded.deal_type,
                 status = excluded.status,
                 deal_value = excluded.deal_value,
                 commission = excluded.commission,
                 closing_date = excluded.closing_date",
        )
        .bind(deal.id.0)
        .bind(deal.contact_id.0)
        .bind(deal.property_id.0)
        .bind(&deal.deal_type)
        .bind(deal.status.as_str())
        .bind(deal.deal_value.to_string())
        .bind(deal.commission.map(|value| value.to_string()))
        .bind(deal.created_date.map(|at| at.to_rfc3339()))
        .bind(deal.closing_date.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Deals feed probability estimates, so an unknown status or value is a
/// decode failure rather than a silent default.
pub(crate) fn row_to_deal(row: &sqlx::sqlite::SqliteRow) -> Result<Deal, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let status_str: String = column(row, "status")?;
    let status = DealStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("deal {id}: unknown status `{status_str}`")))?;
    let value_str: String = column(row, "deal_value")?;

    Ok(Deal {
        id: DealId(id),
        contact_id: ContactId(column(row, "contact_id")?),
        property_id: PropertyId(column(row, "property_id")?),
        deal_type: column(row, "deal_type")?,
        status,
        deal_value: parse_money(&value_str, "deal_value")?,
        commission: optional_money(row, "commission")?,
        created_date: optional_timestamp(row, "created_date")?,
        closing_date: optional_timestamp(row, "closing_date")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use aura_core::domain::contact::{Contact, ContactId, LeadStatus};
    use aura_core::domain::deal::{Deal, DealId, DealStatus};
    use aura_core::domain::property::{Property, PropertyId};

    use super::SqlDealRepository;
    use crate::repositories::{RepositoryError, SqlContactRepository, SqlPropertyRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlContactRepository::new(pool.clone())
            .save(&Contact::new(1, "Sara Khan", LeadStatus::Hot))
            .await
            .expect("contact");
        SqlPropertyRepository::new(pool.clone())
            .save(&Property::new(1, "Marina Heights", "1204"))
            .await
            .expect("property");
        pool
    }

    #[tokio::test]
    async fn save_then_find_preserves_fields() {
        let repo = SqlDealRepository::new(setup().await);
        let deal = Deal {
            id: DealId(1),
            contact_id: ContactId(1),
            property_id: PropertyId(1),
            deal_type: Some("Sale".to_owned()),
            status: DealStatus::Pending,
            deal_value: Decimal::new(1_850_000, 0),
            commission: Some(Decimal::new(37_000, 0)),
            created_date: Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).single(),
            closing_date: None,
        };

        repo.save(&deal).await.expect("save");
        assert_eq!(repo.find_by_id(DealId(1)).await.expect("find"), Some(deal));
    }

    #[tokio::test]
    async fn unknown_status_fails_lookup_and_is_skipped_by_list() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO deals (id, contact_id, property_id, status, deal_value)
             VALUES (1, 1, 1, 'limbo', '100'), (2, 1, 1, 'Active', '2000000')",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let repo = SqlDealRepository::new(pool);
        assert!(matches!(repo.find_by_id(DealId(1)).await, Err(RepositoryError::Decode(_))));
        let listed = repo.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, DealId(2));
    }
}
