use std::collections::BTreeMap;

use aura_core::domain::contact::ContactId;
use aura_core::domain::lead_score::LeadScore;

use super::{column, RepositoryError};
use crate::DbPool;

pub struct SqlLeadScoreRepository {
    pool: DbPool,
}

impl SqlLeadScoreRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, contact_id: ContactId) -> Result<Option<LeadScore>, RepositoryError> {
        let row = sqlx::query(
            "SELECT contact_id, score, score_factors, last_calculated
             FROM lead_scores WHERE contact_id = ?",
        )
        .bind(contact_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_lead_score(r)?)),
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, score: &LeadScore) -> Result<(), RepositoryError> {
        let factors = serde_json::to_string(&score.score_factors)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO lead_scores (contact_id, score, score_factors, last_calculated)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(contact_id) DO UPDATE SET
                 score = excluded.score,
                 score_factors = excluded.score_factors,
                 last_calculated = excluded.last_calculated",
        )
        .bind(score.contact_id.0)
        .bind(i64::from(score.score))
        .bind(factors)
        .bind(score.last_calculated.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_lead_score(row: &sqlx::sqlite::SqliteRow) -> Result<LeadScore, RepositoryError> {
    let contact_id: i64 = column(row, "contact_id")?;
    let score: i64 = column(row, "score")?;
    let factors_json: String = column(row, "score_factors")?;
    let last_calculated: String = column(row, "last_calculated")?;

    let score_factors: BTreeMap<String, f64> = serde_json::from_str(&factors_json)
        .map_err(|e| RepositoryError::Decode(format!("score_factors: {e}")))?;

    Ok(LeadScore {
        contact_id: ContactId(contact_id),
        score: u8::try_from(score)
            .map_err(|_| RepositoryError::Decode(format!("score out of range: {score}")))?,
        score_factors,
        last_calculated: super::parse_timestamp(&last_calculated).ok_or_else(|| {
            RepositoryError::Decode(format!("last_calculated `{last_calculated}`"))
        })?,
    })
}
