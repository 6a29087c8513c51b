use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contact::ContactId;
use crate::domain::property::PropertyId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DealId(pub i64);

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStatus {
    Active,
    Pending,
    Closed,
    Lost,
    Cancelled,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Pending => "Pending",
            Self::Closed => "Closed",
            Self::Lost => "Lost",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" | "open" | "in progress" => Some(Self::Active),
            "pending" | "negotiation" => Some(Self::Pending),
            "closed" | "won" | "completed" => Some(Self::Closed),
            "lost" => Some(Self::Lost),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub contact_id: ContactId,
    pub property_id: PropertyId,
    pub deal_type: Option<String>,
    pub status: DealStatus,
    pub deal_value: Decimal,
    pub commission: Option<Decimal>,
    pub created_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
}
