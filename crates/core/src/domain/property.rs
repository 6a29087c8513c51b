use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub i64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyStatus {
    Available,
    UnderOffer,
    Sold,
    Rented,
    OffMarket,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::UnderOffer => "Under Offer",
            Self::Sold => "Sold",
            Self::Rented => "Rented",
            Self::OffMarket => "Off Market",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String =
            raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase();
        match folded.as_str() {
            "available" | "forsale" | "forrent" => Some(Self::Available),
            "underoffer" | "reserved" => Some(Self::UnderOffer),
            "sold" => Some(Self::Sold),
            "rented" | "leased" => Some(Self::Rented),
            "offmarket" | "withdrawn" => Some(Self::OffMarket),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub building: String,
    pub unit: String,
    pub area: Option<String>,
    pub property_type: Option<String>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub size_sqft: Option<f64>,
    pub price: Option<Decimal>,
    pub status: PropertyStatus,
    pub description: Option<String>,
}

impl Property {
    pub fn new(id: i64, building: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id: PropertyId(id),
            building: building.into(),
            unit: unit.into(),
            area: None,
            property_type: None,
            bedrooms: None,
            bathrooms: None,
            size_sqft: None,
            price: None,
            status: PropertyStatus::Available,
            description: None,
        }
    }

    /// Human label, e.g. `Marina Heights Unit 1204`.
    pub fn label(&self) -> String {
        format!("{} Unit {}", self.building, self.unit)
    }

    pub fn is_available(&self) -> bool {
        self.status == PropertyStatus::Available
    }
}
