//! Buyer matching: rank active leads against one property.

use std::collections::{HashMap, HashSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::profile::{BuyerProfile, PartialProfile};
use crate::domain::contact::{Contact, ContactId, LeadStatus};
use crate::domain::property::Property;
use crate::domain::relationship::{ContactProperty, RelationshipKind};
use crate::knowledge::KnowledgeBase;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub property_type: f64,
    pub bedrooms: f64,
    pub price: f64,
    pub area: f64,
    /// Agreement credited when either side lacks the attribute.
    pub unknown_agreement: f64,
    /// Flat score for candidates whose notes yield no profile.
    pub no_profile_baseline: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            property_type: 35.0,
            bedrooms: 25.0,
            price: 25.0,
            area: 15.0,
            unknown_agreement: 0.3,
            no_profile_baseline: 20.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuyerMatch {
    pub contact_id: ContactId,
    pub contact_name: String,
    pub lead_status: LeadStatus,
    pub lead_score: Option<u8>,
    pub match_score: u8,
    pub profile: BuyerProfile,
    pub reasons: Vec<String>,
}

pub struct BuyerMatcher<'a> {
    knowledge: &'a KnowledgeBase,
    weights: MatchWeights,
}

impl<'a> BuyerMatcher<'a> {
    pub fn new(knowledge: &'a KnowledgeBase) -> Self {
        Self { knowledge, weights: MatchWeights::default() }
    }

    pub fn with_weights(knowledge: &'a KnowledgeBase, weights: MatchWeights) -> Self {
        Self { knowledge, weights }
    }

    /// Hot and Warm contacts ranked by fit for `property`. Contacts holding an
    /// owner link to the property are never candidates.
    pub fn find_buyers(
        &self,
        property: &Property,
        contacts: &[Contact],
        relationships: &[ContactProperty],
        lead_scores: &HashMap<ContactId, u8>,
    ) -> Vec<BuyerMatch> {
        let owners: HashSet<ContactId> = relationships
            .iter()
            .filter(|link| {
                link.property_id == property.id && link.relationship == RelationshipKind::Owner
            })
            .map(|link| link.contact_id)
            .collect();

        let mut matches: Vec<BuyerMatch> = contacts
            .iter()
            .filter(|contact| contact.lead_status.is_some_and(|status| status.is_active_lead()))
            .filter(|contact| !owners.contains(&contact.id))
            .map(|contact| {
                let profile = BuyerProfile::from_notes(contact.notes.as_deref(), self.knowledge);
                let (score, reasons) = self.evaluate(&profile, property);
                BuyerMatch {
                    contact_id: contact.id,
                    contact_name: contact.name.clone(),
                    lead_status: contact.effective_status(),
                    lead_score: lead_scores.get(&contact.id).copied(),
                    match_score: score,
                    profile,
                    reasons,
                }
            })
            .collect();

        matches.sort_by(|left, right| {
            right
                .match_score
                .cmp(&left.match_score)
                .then_with(|| right.lead_score.unwrap_or(0).cmp(&left.lead_score.unwrap_or(0)))
                .then_with(|| left.contact_id.cmp(&right.contact_id))
        });
        matches
    }

    fn evaluate(&self, profile: &BuyerProfile, property: &Property) -> (u8, Vec<String>) {
        match profile {
            BuyerProfile::NoProfile => (
                to_score(self.weights.no_profile_baseline),
                vec!["No stated preferences; included at baseline".to_string()],
            ),
            BuyerProfile::Partial(preferences) => self.score_partial(preferences, property),
        }
    }

    fn score_partial(&self, wanted: &PartialProfile, property: &Property) -> (u8, Vec<String>) {
        let weights = &self.weights;
        let mut reasons = Vec::new();

        let type_agreement = match property.property_type.as_deref() {
            Some(kind) if !wanted.property_types.is_empty() => {
                let kind = kind.to_lowercase();
                if wanted.property_types.iter().any(|wanted| *wanted == kind) {
                    reasons.push(format!("Wants a {kind}"));
                    1.0
                } else {
                    0.0
                }
            }
            _ => weights.unknown_agreement,
        };

        let bedroom_agreement = match (wanted.bedrooms, property.bedrooms) {
            (Some(wanted), Some(actual)) if wanted == actual => {
                reasons.push(format!("{actual} bedrooms as requested"));
                1.0
            }
            (Some(wanted), Some(actual)) if wanted.abs_diff(actual) == 1 => 0.5,
            (Some(_), Some(_)) => 0.0,
            _ => weights.unknown_agreement,
        };

        let price_agreement = match (wanted.price_ceiling, property.price) {
            (Some(ceiling), Some(price)) => {
                if price <= ceiling {
                    reasons.push("Within budget".to_string());
                    1.0
                } else if price <= ceiling * Decimal::new(11, 1) {
                    reasons.push("Slightly above budget".to_string());
                    0.5
                } else {
                    0.0
                }
            }
            _ => weights.unknown_agreement,
        };

        let area_agreement = match property.area.as_deref() {
            Some(area) if !wanted.areas.is_empty() => {
                let area = area.to_lowercase();
                if wanted.areas.iter().any(|wanted| area.contains(wanted.as_str())) {
                    reasons.push(format!("Interested in {area}"));
                    1.0
                } else {
                    0.0
                }
            }
            _ => weights.unknown_agreement,
        };

        if wanted.urgent {
            reasons.push("Urgent buyer".to_string());
        }

        let total = type_agreement * weights.property_type
            + bedroom_agreement * weights.bedrooms
            + price_agreement * weights.price
            + area_agreement * weights.area;
        (to_score(total), reasons)
    }
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0).to_u8().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::BuyerMatcher;
    use crate::domain::contact::{Contact, ContactId, LeadStatus};
    use crate::domain::property::{Property, PropertyId};
    use crate::domain::relationship::{ContactProperty, RelationshipKind};
    use crate::knowledge::KnowledgeBase;
    use crate::scoring::BuyerProfile;

    fn marina_two_bed() -> Property {
        let mut property = Property::new(10, "Marina Residences", "1204");
        property.area = Some("Dubai Marina".to_string());
        property.property_type = Some("Apartment".to_string());
        property.bedrooms = Some(2);
        property.price = Some(Decimal::from(2_400_000));
        property
    }

    fn lead(id: i64, status: LeadStatus, notes: Option<&str>) -> Contact {
        let mut contact = Contact::new(id, &format!("Lead {id}"), status);
        contact.notes = notes.map(str::to_string);
        contact
    }

    #[test]
    fn ranks_full_profile_match_above_baseline() {
        let knowledge = KnowledgeBase::default();
        let contacts = vec![
            lead(1, LeadStatus::Warm, Some("met at expo")),
            lead(2, LeadStatus::Hot, Some("2br apartment in dubai marina, budget 2.5m")),
            lead(3, LeadStatus::Cold, Some("2br apartment in dubai marina, budget 2.5m")),
        ];

        let matches =
            BuyerMatcher::new(&knowledge).find_buyers(&marina_two_bed(), &contacts, &[], &HashMap::new());

        let ids: Vec<i64> = matches.iter().map(|entry| entry.contact_id.0).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(matches[0].match_score, 100);
        assert_eq!(matches[1].match_score, 20);
        assert_eq!(matches[1].profile, BuyerProfile::NoProfile);
    }

    #[test]
    fn owners_of_the_target_are_excluded() {
        let knowledge = KnowledgeBase::default();
        let property = marina_two_bed();
        let contacts = vec![lead(1, LeadStatus::Hot, None), lead(2, LeadStatus::Hot, None)];
        let links = vec![
            ContactProperty {
                contact_id: ContactId(1),
                property_id: property.id,
                relationship: RelationshipKind::Owner,
            },
            ContactProperty {
                contact_id: ContactId(2),
                property_id: PropertyId(99),
                relationship: RelationshipKind::Owner,
            },
        ];

        let matches = BuyerMatcher::new(&knowledge).find_buyers(&property, &contacts, &links, &HashMap::new());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].contact_id, ContactId(2));
    }

    #[test]
    fn ties_break_on_lead_score_then_id() {
        let knowledge = KnowledgeBase::default();
        let contacts = vec![
            lead(1, LeadStatus::Warm, None),
            lead(2, LeadStatus::Warm, None),
            lead(3, LeadStatus::Hot, None),
        ];
        let scores = HashMap::from([(ContactId(2), 75u8), (ContactId(3), 40u8)]);

        let matches = BuyerMatcher::new(&knowledge).find_buyers(&marina_two_bed(), &contacts, &[], &scores);
        let ids: Vec<i64> = matches.iter().map(|entry| entry.contact_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn partial_agreement_on_bedrooms_and_price() {
        let knowledge = KnowledgeBase::default();
        let contacts = vec![lead(1, LeadStatus::Hot, Some("3 bedroom, budget 2.2m"))];

        let matches =
            BuyerMatcher::new(&knowledge).find_buyers(&marina_two_bed(), &contacts, &[], &HashMap::new());
        // type 0.3*35 + bedrooms 0.5*25 + price 0.5*25 + area 0.3*15
        assert_eq!(matches[0].match_score, 40);
    }
}
