use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use thiserror::Error;
use tracing::warn;

use aura_core::store::StoreError;

pub mod contact;
pub mod deal;
pub mod lead_score;
pub mod memory;
pub mod property;
pub mod relationship;
pub mod task;

pub use contact::SqlContactRepository;
pub use deal::SqlDealRepository;
pub use lead_score::SqlLeadScoreRepository;
pub use memory::InMemoryCrmStore;
pub use property::SqlPropertyRepository;
pub use relationship::SqlRelationshipRepository;
pub use task::SqlTaskRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => StoreError::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::NotFound(message) => StoreError::NotFound(message),
        }
    }
}

pub(crate) fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

/// Accepts RFC3339, naive ISO date-times (`T` or space separated) and bare
/// dates. Naive values are read as UTC. Unparseable text is logged and
/// treated as absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|value| value.and_utc());
    }
    warn!(event_name = "db.decode.timestamp_invalid", raw = trimmed, "ignoring unparseable timestamp");
    None
}

pub(crate) fn optional_timestamp(
    row: &sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    let raw: Option<String> = column(row, name)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub(crate) fn parse_money(raw: &str, field: &str) -> Result<Decimal, RepositoryError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("{field} `{raw}`: {e}")))
}

pub(crate) fn optional_money(
    row: &sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let raw: Option<String> = column(row, name)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_money(value, name).map(Some),
    }
}

/// Small non-negative counts such as bedrooms. Out-of-range values read as
/// absent.
pub(crate) fn optional_count(
    row: &sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<Option<u8>, RepositoryError> {
    let raw: Option<i64> = column(row, name)?;
    Ok(raw.and_then(|value| u8::try_from(value).ok()))
}

/// Decodes every row, skipping and logging the ones that fail so one bad
/// record does not hide the rest of the table.
pub(crate) fn decode_rows<T>(
    rows: &[sqlx::sqlite::SqliteRow],
    table: &'static str,
    decode: impl Fn(&sqlx::sqlite::SqliteRow) -> Result<T, RepositoryError>,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(value) => Some(value),
            Err(error) => {
                let id: Option<i64> = row.try_get("id").ok();
                warn!(
                    event_name = "db.row.skipped",
                    table,
                    row_id = ?id,
                    error = %error,
                    "skipping undecodable row"
                );
                None
            }
        })
        .collect()
}
