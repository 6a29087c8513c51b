use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::ContactId;

/// Persisted lead score. Always written as a whole record, never patched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub contact_id: ContactId,
    pub score: u8,
    /// Factor name to weighted contribution.
    pub score_factors: BTreeMap<String, f64>,
    pub last_calculated: DateTime<Utc>,
}
