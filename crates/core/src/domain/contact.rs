use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    Hot,
    Warm,
    Cold,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 3] = [LeadStatus::Hot, LeadStatus::Warm, LeadStatus::Cold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
        }
    }

    /// Case-insensitive parse. Returns `None` for anything outside Hot/Warm/Cold.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" => Some(Self::Hot),
            "warm" => Some(Self::Warm),
            "cold" => Some(Self::Cold),
            _ => None,
        }
    }

    pub fn is_active_lead(&self) -> bool {
        matches!(self, Self::Hot | Self::Warm)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact snapshot as read from storage.
///
/// `lead_status` is optional because upstream records can be incomplete. Every
/// consumer reads it through [`Contact::effective_status`], which treats a
/// missing status as `Cold`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lead_status: Option<LeadStatus>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub last_contacted_date: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn new(id: i64, name: impl Into<String>, lead_status: LeadStatus) -> Self {
        Self {
            id: ContactId(id),
            name: name.into(),
            email: None,
            phone: None,
            lead_status: Some(lead_status),
            source: None,
            notes: None,
            last_contacted_date: None,
            created_date: None,
        }
    }

    pub fn effective_status(&self) -> LeadStatus {
        self.lead_status.unwrap_or(LeadStatus::Cold)
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{Contact, LeadStatus};

    #[test]
    fn status_parse_is_case_insensitive_and_rejects_unknown_values() {
        assert_eq!(LeadStatus::parse(" HOT "), Some(LeadStatus::Hot));
        assert_eq!(LeadStatus::parse("warm"), Some(LeadStatus::Warm));
        assert_eq!(LeadStatus::parse("lukewarm"), None);
    }

    #[test]
    fn missing_status_reads_as_cold() {
        let mut contact = Contact::new(1, "Sara Khan", LeadStatus::Hot);
        contact.lead_status = None;
        assert_eq!(contact.effective_status(), LeadStatus::Cold);
        assert_eq!(contact.first_name(), "Sara");
    }
}
