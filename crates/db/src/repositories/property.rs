use tracing::warn;

use aura_core::domain::property::{Property, PropertyId, PropertyStatus};

use super::{column, decode_rows, optional_count, optional_money, RepositoryError};
use crate::DbPool;

const PROPERTY_COLUMNS: &str = "id, building, unit, area, property_type, bedrooms, bathrooms,
     size_sqft, price, status, description";

pub struct SqlPropertyRepository {
    pool: DbPool,
}

impl SqlPropertyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_property(r)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<Property>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(&rows, "properties", row_to_property))
    }

    pub async fn save(&self, property: &Property) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO properties (id, building, unit, area, property_type, bedrooms, bathrooms,
                                     size_sqft, price, status, description, created_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                 building = excluded.building,
                 unit = excluded.unit,
                 area = excluded.area,
                 property_type = excluded.property_type,
                 bedrooms = excluded.bedrooms,
                 bathrooms = excluded.bathrooms,
                 size_sqft = excluded.size_sqft,
                 price = excluded.price,
                 status = excluded.status,
                 description = excluded.description",
        )
        .bind(property.id.0)
        .bind(&property.building)
        .bind(&property.unit)
        .bind(&property.area)
        .bind(&property.property_type)
        .bind(property.bedrooms.map(i64::from))
        .bind(property.bathrooms.map(i64::from))
        .bind(property.size_sqft)
        .bind(property.price.map(|price| price.to_string()))
        .bind(property.status.as_str())
        .bind(&property.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub(crate) fn row_to_property(row: &sqlx::sqlite::SqliteRow) -> Result<Property, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let status_str: String = column(row, "status")?;
    let status = PropertyStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(
            event_name = "db.decode.property_status_unknown",
            property_id = id,
            raw = %status_str,
            "unknown property status; treating as Off Market"
        );
        PropertyStatus::OffMarket
    });

    Ok(Property {
        id: PropertyId(id),
        building: column(row, "building")?,
        unit: column(row, "unit")?,
        area: column(row, "area")?,
        property_type: column(row, "property_type")?,
        bedrooms: optional_count(row, "bedrooms")?,
        bathrooms: optional_count(row, "bathrooms")?,
        size_sqft: column(row, "size_sqft")?,
        price: optional_money(row, "price")?,
        status,
        description: column(row, "description")?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use aura_core::domain::property::{Property, PropertyId, PropertyStatus};

    use super::SqlPropertyRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_then_find_preserves_fields() {
        let repo = SqlPropertyRepository::new(setup().await);
        let mut property = Property::new(3, "Marina Heights", "1204");
        property.area = Some("Dubai Marina".to_owned());
        property.property_type = Some("Apartment".to_owned());
        property.bedrooms = Some(2);
        property.price = Some(Decimal::new(1_850_000, 0));
        property.status = PropertyStatus::UnderOffer;

        repo.save(&property).await.expect("save");
        let found = repo.find_by_id(PropertyId(3)).await.expect("find").expect("present");
        assert_eq!(found, property);
    }

    #[tokio::test]
    async fn unpriced_and_unknown_status_rows_still_decode() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO properties (id, building, unit, price, status)
             VALUES (1, 'Palm Tower', '3401', '', 'demolished')",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let repo = SqlPropertyRepository::new(pool);
        let property = repo.find_by_id(PropertyId(1)).await.expect("find").expect("present");
        assert_eq!(property.price, None);
        assert_eq!(property.status, PropertyStatus::OffMarket);
    }

    #[tokio::test]
    async fn unparseable_price_rows_are_skipped_by_list() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO properties (id, building, unit, price)
             VALUES (1, 'Palm Tower', '3401', 'on request'), (2, 'Palm Tower', '3402', '2400000')",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let repo = SqlPropertyRepository::new(pool);
        let listed = repo.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, PropertyId(2));
    }
}
