//! Follow-up prioritization.
//!
//! A contact is due once the time since its last contact exceeds the interval
//! for its lead status. Priority is `status_weight + min(days_overdue * per_day, cap)`,
//! so it rises with both status and lateness. The status weights, per-day
//! points and cap are explicit policy constants: with the defaults
//! (Hot 100, Warm 60, Cold 20, 10 points per day, cap 50) a barely overdue Hot
//! lead outranks any Cold lead, and a Warm lead can only pass a fresh Hot one
//! once it is more than four days late.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::days_between;
use crate::domain::contact::{Contact, ContactId, LeadStatus};

/// Overdue days assumed for a contact with no contact or creation date.
const UNKNOWN_HISTORY_OVERDUE_DAYS: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUpPolicy {
    pub hot_interval_days: u32,
    pub warm_interval_days: u32,
    pub cold_interval_days: u32,
    pub hot_weight: f64,
    pub warm_weight: f64,
    pub cold_weight: f64,
    pub overdue_points_per_day: f64,
    pub overdue_points_cap: f64,
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self {
            hot_interval_days: 1,
            warm_interval_days: 3,
            cold_interval_days: 7,
            hot_weight: 100.0,
            warm_weight: 60.0,
            cold_weight: 20.0,
            overdue_points_per_day: 10.0,
            overdue_points_cap: 50.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTask {
    pub contact_id: ContactId,
    pub contact_name: String,
    pub lead_status: LeadStatus,
    pub priority: f64,
    pub days_overdue: f64,
    pub reason: String,
}

impl FollowUpPolicy {
    pub fn interval_days(&self, status: LeadStatus) -> u32 {
        match status {
            LeadStatus::Hot => self.hot_interval_days,
            LeadStatus::Warm => self.warm_interval_days,
            LeadStatus::Cold => self.cold_interval_days,
        }
    }

    pub fn interval(&self, status: LeadStatus) -> Duration {
        Duration::days(i64::from(self.interval_days(status)))
    }

    pub fn status_weight(&self, status: LeadStatus) -> f64 {
        match status {
            LeadStatus::Hot => self.hot_weight,
            LeadStatus::Warm => self.warm_weight,
            LeadStatus::Cold => self.cold_weight,
        }
    }

    pub fn priority(&self, status: LeadStatus, days_overdue: f64) -> f64 {
        let lateness = (days_overdue.max(0.0) * self.overdue_points_per_day)
            .min(self.overdue_points_cap);
        self.status_weight(status) + lateness
    }

    /// Evaluates one contact. `None` means it is not due yet.
    pub fn evaluate(&self, contact: &Contact, now: DateTime<Utc>) -> Option<FollowUpTask> {
        let status = contact.effective_status();
        let interval = f64::from(self.interval_days(status));

        let (days_overdue, history) = match (contact.last_contacted_date, contact.created_date) {
            (Some(last), _) => {
                let elapsed = days_between(last, now);
                if elapsed <= interval {
                    return None;
                }
                (elapsed - interval, format!("last contacted {:.1} days ago", elapsed))
            }
            (None, Some(created)) => {
                let elapsed = days_between(created, now);
                if elapsed <= interval {
                    return None;
                }
                (elapsed - interval, format!("never contacted, added {:.1} days ago", elapsed))
            }
            (None, None) => (UNKNOWN_HISTORY_OVERDUE_DAYS, "no contact history".to_string()),
        };

        let interval_days = self.interval_days(status);
        let plural = if interval_days == 1 { "" } else { "s" };
        Some(FollowUpTask {
            contact_id: contact.id,
            contact_name: contact.name.clone(),
            lead_status: status,
            priority: self.priority(status, days_overdue),
            days_overdue,
            reason: format!(
                "{status} lead, {history} (follow up every {interval_days} day{plural})"
            ),
        })
    }

    /// Overdue contacts only, highest priority first; ties go to the more
    /// overdue contact, then the lower id.
    pub fn prioritize(&self, contacts: &[Contact], now: DateTime<Utc>) -> Vec<FollowUpTask> {
        let mut tasks: Vec<FollowUpTask> =
            contacts.iter().filter_map(|contact| self.evaluate(contact, now)).collect();
        tasks.sort_by(|left, right| {
            right
                .priority
                .partial_cmp(&left.priority)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    right.days_overdue.partial_cmp(&left.days_overdue).unwrap_or(Ordering::Equal)
                })
                .then_with(|| left.contact_id.cmp(&right.contact_id))
        });
        tasks
    }

    pub fn validate(&self) -> Result<(), String> {
        let intervals = [self.hot_interval_days, self.warm_interval_days, self.cold_interval_days];
        if intervals.iter().any(|days| *days == 0) {
            return Err("follow-up intervals must be at least one day".to_string());
        }
        let numbers = [
            self.hot_weight,
            self.warm_weight,
            self.cold_weight,
            self.overdue_points_per_day,
            self.overdue_points_cap,
        ];
        if numbers.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err("follow-up weights and overdue points must be finite and non-negative"
                .to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::FollowUpPolicy;
    use crate::domain::contact::{Contact, LeadStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).single().expect("valid date")
    }

    fn contacted(id: i64, status: LeadStatus, days_ago: f64) -> Contact {
        let mut contact = Contact::new(id, format!("Contact {id}"), status);
        contact.last_contacted_date =
            Some(now() - Duration::seconds((days_ago * 86_400.0).round() as i64));
        contact
    }

    #[test]
    fn contacts_within_interval_are_excluded() {
        let policy = FollowUpPolicy::default();
        let contacts = vec![
            contacted(1, LeadStatus::Hot, 1.0),
            contacted(2, LeadStatus::Warm, 3.0),
            contacted(3, LeadStatus::Cold, 6.5),
            contacted(4, LeadStatus::Hot, 1.5),
        ];

        let due = policy.prioritize(&contacts, now());
        let ids: Vec<i64> = due.iter().map(|task| task.contact_id.0).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn no_included_contact_is_inside_its_interval() {
        let policy = FollowUpPolicy::default();
        let contacts: Vec<Contact> = (0..60)
            .map(|step| {
                let status = LeadStatus::ALL[step % 3];
                contacted(step as i64, status, step as f64 * 0.37)
            })
            .collect();

        for task in policy.prioritize(&contacts, now()) {
            let contact = contacts
                .iter()
                .find(|contact| contact.id == task.contact_id)
                .expect("task refers to input contact");
            let last = contact.last_contacted_date.expect("contacted");
            let elapsed = now() - last;
            assert!(elapsed > policy.interval(contact.effective_status()));
        }
    }

    #[test]
    fn priority_rises_with_status_and_lateness() {
        let policy = FollowUpPolicy::default();
        assert!(policy.priority(LeadStatus::Hot, 0.1) > policy.priority(LeadStatus::Cold, 30.0));
        assert!(policy.priority(LeadStatus::Warm, 2.0) > policy.priority(LeadStatus::Warm, 1.0));
        assert_eq!(policy.priority(LeadStatus::Cold, 100.0), 70.0);
    }

    #[test]
    fn ordering_uses_priority_then_overdue_then_id() {
        let policy = FollowUpPolicy::default();
        let contacts = vec![
            contacted(5, LeadStatus::Cold, 20.0),
            contacted(2, LeadStatus::Hot, 9.0),
            contacted(1, LeadStatus::Hot, 12.0),
            contacted(3, LeadStatus::Warm, 5.0),
        ];

        let due = policy.prioritize(&contacts, now());
        let ids: Vec<i64> = due.iter().map(|task| task.contact_id.0).collect();
        // Both Hot leads hit the overdue cap (150); the older one wins the tie.
        assert_eq!(ids, vec![1, 2, 3, 5]);
        assert!(due[0].reason.starts_with("Hot lead"));
    }

    #[test]
    fn contact_without_history_is_due() {
        let policy = FollowUpPolicy::default();
        let mut contact = Contact::new(8, "Fresh Import", LeadStatus::Warm);
        contact.lead_status = None;

        let task = policy.evaluate(&contact, now()).expect("due");
        assert_eq!(task.lead_status, LeadStatus::Cold);
        assert_eq!(task.priority, 30.0);
    }

    #[test]
    fn custom_constants_change_the_trade_off() {
        let policy = FollowUpPolicy {
            overdue_points_per_day: 40.0,
            overdue_points_cap: 200.0,
            ..FollowUpPolicy::default()
        };
        let contacts =
            vec![contacted(1, LeadStatus::Hot, 1.2), contacted(2, LeadStatus::Cold, 10.0)];
        let due = policy.prioritize(&contacts, now());
        assert_eq!(due[0].contact_id.0, 2);
        assert!(policy.validate().is_ok());

        let broken = FollowUpPolicy { warm_interval_days: 0, ..FollowUpPolicy::default() };
        assert!(broken.validate().is_err());
    }
}
