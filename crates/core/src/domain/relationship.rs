use serde::{Deserialize, Serialize};

use crate::domain::contact::ContactId;
use crate::domain::property::PropertyId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    Owner,
    PreviousOwner,
    Interested,
    ViewingScheduled,
    Tenant,
    Other,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::PreviousOwner => "Previous Owner",
            Self::Interested => "Interested",
            Self::ViewingScheduled => "Viewing Scheduled",
            Self::Tenant => "Tenant",
            Self::Other => "Other",
        }
    }

    /// Unrecognised labels become `Other`, never an error.
    pub fn parse(raw: &str) -> Self {
        let folded: String =
            raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase();
        match folded.as_str() {
            "owner" | "landlord" => Self::Owner,
            "previousowner" | "formerowner" => Self::PreviousOwner,
            "interested" | "buyer" | "prospect" => Self::Interested,
            "viewingscheduled" | "viewing" => Self::ViewingScheduled,
            "tenant" => Self::Tenant,
            _ => Self::Other,
        }
    }

    pub fn shows_interest(&self) -> bool {
        matches!(self, Self::Interested | Self::ViewingScheduled)
    }
}

/// Link between a contact and a property.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactProperty {
    pub contact_id: ContactId,
    pub property_id: PropertyId,
    pub relationship: RelationshipKind,
}
