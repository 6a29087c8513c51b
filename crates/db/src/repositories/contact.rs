use chrono::{DateTime, Utc};
use tracing::warn;

use aura_core::domain::contact::{Contact, ContactId, LeadStatus};

use super::{column, decode_rows, optional_timestamp, RepositoryError};
use crate::DbPool;

const CONTACT_COLUMNS: &str = "id, name, email, phone, lead_status, source, notes,
     last_contacted_date, created_date";

pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_contact(r)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(&rows, "contacts", row_to_contact))
    }

    pub async fn save(&self, contact: &Contact) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO contacts (id, name, email, phone, lead_status, source, notes,
                                   last_contacted_date, created_date, updated_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 phone = excluded.phone,
                 lead_status = excluded.lead_status,
                 source = excluded.source,
                 notes = excluded.notes,
                 last_contacted_date = excluded.last_contacted_date,
                 updated_date = excluded.updated_date",
        )
        .bind(contact.id.0)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(contact.lead_status.map(|status| status.as_str()))
        .bind(&contact.source)
        .bind(&contact.notes)
        .bind(contact.last_contacted_date.map(|at| at.to_rfc3339()))
        .bind(contact.created_date.map(|at| at.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_contacted(
        &self,
        id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let stamp = at.to_rfc3339();
        let result = sqlx::query(
            "UPDATE contacts SET last_contacted_date = ?, updated_date = ? WHERE id = ?",
        )
        .bind(&stamp)
        .bind(&stamp)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("contact {id}")));
        }
        Ok(())
    }
}

/// A null status stays `None`; unrecognised text reads as Cold.
fn decode_lead_status(raw: Option<String>, id: i64) -> Option<LeadStatus> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    Some(LeadStatus::parse(&raw).unwrap_or_else(|| {
        warn!(
            event_name = "db.decode.lead_status_unknown",
            contact_id = id,
            raw = %raw,
            "unknown lead status; treating as Cold"
        );
        LeadStatus::Cold
    }))
}

pub(crate) fn row_to_contact(row: &sqlx::sqlite::SqliteRow) -> Result<Contact, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let lead_status = decode_lead_status(column(row, "lead_status")?, id);

    Ok(Contact {
        id: ContactId(id),
        name: column(row, "name")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        lead_status,
        source: column(row, "source")?,
        notes: column(row, "notes")?,
        last_contacted_date: optional_timestamp(row, "last_contacted_date")?,
        created_date: optional_timestamp(row, "created_date")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use aura_core::domain::contact::{Contact, ContactId, LeadStatus};

    use super::SqlContactRepository;
    use crate::repositories::RepositoryError;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_then_find_preserves_fields() {
        let pool = setup().await;
        let repo = SqlContactRepository::new(pool);
        let mut contact = Contact::new(7, "Layla Mansour", LeadStatus::Warm);
        contact.email = Some("layla@example.com".to_owned());
        contact.source = Some("Referral".to_owned());
        contact.created_date = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).single();

        repo.save(&contact).await.expect("save");
        let found = repo.find_by_id(ContactId(7)).await.expect("find").expect("present");
        assert_eq!(found, contact);
    }

    #[tokio::test]
    async fn unknown_status_reads_as_cold_and_null_stays_absent() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO contacts (id, name, lead_status) VALUES (1, 'A B', 'lukewarm'), (2, 'C D', NULL)",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let repo = SqlContactRepository::new(pool);
        let contacts = repo.list().await.expect("list");
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].lead_status, Some(LeadStatus::Cold));
        assert_eq!(contacts[1].lead_status, None);
    }

    #[tokio::test]
    async fn legacy_naive_timestamps_decode() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO contacts (id, name, last_contacted_date) VALUES (1, 'A B', '2026-02-10 14:00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let repo = SqlContactRepository::new(pool);
        let contact = repo.find_by_id(ContactId(1)).await.expect("find").expect("present");
        assert_eq!(contact.last_contacted_date, Utc.with_ymd_and_hms(2026, 2, 10, 14, 0, 0).single());
    }

    #[tokio::test]
    async fn mark_contacted_reports_missing_contacts() {
        let pool = setup().await;
        let repo = SqlContactRepository::new(pool);
        repo.save(&Contact::new(1, "Sara Khan", LeadStatus::Hot)).await.expect("save");

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        repo.mark_contacted(ContactId(1), at).await.expect("mark");
        let contact = repo.find_by_id(ContactId(1)).await.expect("find").expect("present");
        assert_eq!(contact.last_contacted_date, Some(at));

        let missing = repo.mark_contacted(ContactId(99), at).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }
}
