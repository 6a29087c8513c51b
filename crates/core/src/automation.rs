//! Agent automation: follow-up email drafts, viewing bookings, overdue tasks
//! and the daily briefing.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::contact::{Contact, ContactId};
use crate::domain::property::{Property, PropertyId};
use crate::domain::relationship::{ContactProperty, RelationshipKind};
use crate::domain::task::{NewTask, NewViewing, Task, TaskId, TaskPriority};
use crate::errors::DomainError;
use crate::knowledge::KnowledgeBase;
use crate::scoring::{FollowUpPolicy, FollowUpTask};

/// Template used when the requested one is not in the knowledge base.
pub const DEFAULT_TEMPLATE: &str = "follow_up_default";
const DEFAULT_SUBJECT: &str = "Follow-up";
const DEFAULT_BODY: &str = "Hi {{ name }},\n\nI wanted to follow up with you regarding your real estate needs.\n\nBest regards,\nYour Real Estate Agent";
const NO_PROPERTY_PLACEHOLDER: &str = "properties in your area";
/// Follow-ups above this priority count as urgent in the briefing.
const URGENT_FOLLOW_UP_PRIORITY: f64 = 100.0;
const BRIEFING_HIGHLIGHTS: usize = 3;
/// Hour used when a viewing request names a day but no time.
const DEFAULT_VIEWING_HOUR: u32 = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmailDraft {
    pub contact_id: ContactId,
    pub to_name: String,
    pub to_email: Option<String>,
    pub template: String,
    pub subject: String,
    pub body: String,
}

/// Renders knowledge-base email templates with tera.
pub struct EmailComposer {
    tera: Tera,
}

impl EmailComposer {
    pub fn new(knowledge: &KnowledgeBase) -> Result<Self, DomainError> {
        let mut tera = Tera::default();
        add_template(&mut tera, DEFAULT_TEMPLATE, DEFAULT_SUBJECT, DEFAULT_BODY)?;
        for template in &knowledge.email_templates {
            add_template(&mut tera, &template.name, &template.subject, &template.body)?;
        }
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|candidate| candidate == subject_key(name))
    }

    /// Drafts `template` for `contact`, falling back to the built-in default
    /// when the name is unknown.
    pub fn compose(
        &self,
        contact: &Contact,
        interest: Option<&Property>,
        template: &str,
    ) -> Result<EmailDraft, DomainError> {
        let template = if self.has_template(template) { template } else { DEFAULT_TEMPLATE };

        let mut context = Context::new();
        context.insert("name", &contact.name);
        context.insert("first_name", contact.first_name());
        context.insert("property", &describe_interest(interest));
        context.insert("status", contact.effective_status().as_str());

        let render = |key: String| {
            self.tera.render(&key, &context).map_err(|error| DomainError::Template(error.to_string()))
        };

        Ok(EmailDraft {
            contact_id: contact.id,
            to_name: contact.name.clone(),
            to_email: contact.email.clone(),
            template: template.to_string(),
            subject: render(subject_key(template))?,
            body: render(body_key(template))?,
        })
    }
}

fn add_template(tera: &mut Tera, name: &str, subject: &str, body: &str) -> Result<(), DomainError> {
    tera.add_raw_templates(vec![(subject_key(name), subject), (body_key(name), body)])
        .map_err(|error| DomainError::Template(format!("template `{name}`: {error}")))
}

fn subject_key(name: &str) -> String {
    format!("{name}.subject")
}

fn body_key(name: &str) -> String {
    format!("{name}.body")
}

fn describe_interest(property: Option<&Property>) -> String {
    match property {
        Some(property) => match property.area.as_deref() {
            Some(area) => format!("{} in {area}", property.label()),
            None => property.label(),
        },
        None => NO_PROPERTY_PLACEHOLDER.to_string(),
    }
}

/// The property a contact most recently showed interest in. Links are taken
/// in storage order, so the last matching link wins.
pub fn latest_interest<'a>(
    contact_id: ContactId,
    relationships: &[ContactProperty],
    properties: &'a [Property],
) -> Option<&'a Property> {
    relationships
        .iter()
        .rev()
        .filter(|link| link.contact_id == contact_id && link.relationship.shows_interest())
        .find_map(|link| properties.iter().find(|property| property.id == link.property_id))
}

/// Reads a viewing slot from free text: a day (`today`, `tomorrow` or
/// `YYYY-MM-DD`) and/or a clock time (`15:00`, `3pm`, `3:30 pm`). A day on its
/// own means 10:00. A time on its own means its next occurrence after `now`.
/// Times are UTC.
pub fn parse_viewing_time(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != ':' && ch != '-')
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect();

    let today = now.date_naive();
    let date = tokens.iter().find_map(|token| match token.as_str() {
        "today" | "tonight" => Some(today),
        "tomorrow" => today.succ_opt(),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    });
    let time = tokens.iter().enumerate().find_map(|(index, token)| {
        clock_time(token, tokens.get(index + 1).map(String::as_str))
    });

    match (date, time) {
        (None, None) => None,
        (Some(date), time) => {
            let time = time.or_else(|| NaiveTime::from_hms_opt(DEFAULT_VIEWING_HOUR, 0, 0))?;
            Some(date.and_time(time).and_utc())
        }
        (None, Some(time)) => {
            let candidate = today.and_time(time).and_utc();
            if candidate > now {
                Some(candidate)
            } else {
                today.succ_opt().map(|day| day.and_time(time).and_utc())
            }
        }
    }
}

fn clock_time(token: &str, next: Option<&str>) -> Option<NaiveTime> {
    for suffix in ["am", "pm"] {
        if let Some(digits) = token.strip_suffix(suffix) {
            return twelve_hour(digits, suffix);
        }
    }
    if let Some(suffix @ ("am" | "pm")) = next {
        return twelve_hour(token, suffix);
    }
    if token.contains(':') {
        return NaiveTime::parse_from_str(token, "%H:%M").ok();
    }
    None
}

fn twelve_hour(digits: &str, suffix: &str) -> Option<NaiveTime> {
    let (hour, minute) = match digits.split_once(':') {
        Some((hour, minute)) => (hour.parse::<u32>().ok()?, minute.parse::<u32>().ok()?),
        None => (digits.parse::<u32>().ok()?, 0),
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (suffix, hour) {
        ("am", 12) => 0,
        ("am", hour) => hour,
        ("pm", 12) => 12,
        (_, hour) => hour + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Builds the booking for a viewing. The task title contains "viewing" so the
/// daily briefing picks it up on the day.
pub fn plan_viewing(
    contact: &Contact,
    property: &Property,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<NewViewing, DomainError> {
    if at <= now {
        return Err(DomainError::InvariantViolation(format!(
            "viewing time {} is not in the future",
            at.format("%Y-%m-%d %H:%M")
        )));
    }
    let label = property.label();
    Ok(NewViewing {
        task: NewTask {
            title: format!("Property viewing: {label}"),
            description: Some(format!(
                "Viewing with {} at {label} on {}",
                contact.name,
                at.format("%Y-%m-%d %H:%M")
            )),
            priority: TaskPriority::High,
            contact_id: Some(contact.id),
            property_id: Some(property.id),
            due_date: Some(at),
            created_date: now,
        },
        link: ContactProperty {
            contact_id: contact.id,
            property_id: property.id,
            relationship: RelationshipKind::ViewingScheduled,
        },
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverdueTask {
    pub task_id: TaskId,
    pub title: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub days_overdue: i64,
    pub contact_name: Option<String>,
    pub property: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Viewing {
    pub task_id: TaskId,
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub contact_name: Option<String>,
    pub property: Option<String>,
}

struct Lookup<'a> {
    contacts: HashMap<ContactId, &'a Contact>,
    properties: HashMap<PropertyId, &'a Property>,
}

impl<'a> Lookup<'a> {
    fn new(contacts: &'a [Contact], properties: &'a [Property]) -> Self {
        Self {
            contacts: contacts.iter().map(|contact| (contact.id, contact)).collect(),
            properties: properties.iter().map(|property| (property.id, property)).collect(),
        }
    }

    fn contact_name(&self, task: &Task) -> Option<String> {
        task.contact_id.and_then(|id| self.contacts.get(&id)).map(|contact| contact.name.clone())
    }

    fn property_label(&self, task: &Task) -> Option<String> {
        task.property_id.and_then(|id| self.properties.get(&id)).map(|property| property.label())
    }
}

/// Open tasks whose due date has passed, oldest due date first.
pub fn overdue_tasks(
    tasks: &[Task],
    contacts: &[Contact],
    properties: &[Property],
    now: DateTime<Utc>,
) -> Vec<OverdueTask> {
    let lookup = Lookup::new(contacts, properties);
    let mut overdue: Vec<OverdueTask> = tasks
        .iter()
        .filter(|task| task.status.is_open())
        .filter_map(|task| {
            let due_date = task.due_date.filter(|due| *due < now)?;
            Some(OverdueTask {
                task_id: task.id,
                title: task.title.clone(),
                priority: task.priority,
                due_date,
                days_overdue: (now - due_date).num_days(),
                contact_name: lookup.contact_name(task),
                property: lookup.property_label(task),
            })
        })
        .collect();
    overdue.sort_by(|left, right| {
        left.due_date.cmp(&right.due_date).then_with(|| left.task_id.cmp(&right.task_id))
    });
    overdue
}

/// Open viewing tasks due on the same UTC calendar day as `now`.
pub fn todays_viewings(
    tasks: &[Task],
    contacts: &[Contact],
    properties: &[Property],
    now: DateTime<Utc>,
) -> Vec<Viewing> {
    let lookup = Lookup::new(contacts, properties);
    let today = now.date_naive();
    let mut viewings: Vec<Viewing> = tasks
        .iter()
        .filter(|task| task.status.is_open() && task.title.to_lowercase().contains("viewing"))
        .filter_map(|task| {
            let due_date = task.due_date.filter(|due| due.date_naive() == today)?;
            Some(Viewing {
                task_id: task.id,
                title: task.title.clone(),
                due_date,
                contact_name: lookup.contact_name(task),
                property: lookup.property_label(task),
            })
        })
        .collect();
    viewings.sort_by(|left, right| left.due_date.cmp(&right.due_date));
    viewings
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyBriefing {
    pub date: NaiveDate,
    pub follow_ups_count: usize,
    pub urgent_follow_ups: Vec<FollowUpTask>,
    pub overdue_tasks_count: usize,
    pub urgent_overdue_tasks: Vec<OverdueTask>,
    pub todays_viewings: Vec<Viewing>,
    pub summary: String,
}

pub fn daily_briefing(
    policy: &FollowUpPolicy,
    contacts: &[Contact],
    tasks: &[Task],
    properties: &[Property],
    now: DateTime<Utc>,
) -> DailyBriefing {
    let follow_ups = policy.prioritize(contacts, now);
    let overdue = overdue_tasks(tasks, contacts, properties, now);
    let viewings = todays_viewings(tasks, contacts, properties, now);

    let urgent: Vec<FollowUpTask> =
        follow_ups.iter().filter(|task| task.priority > URGENT_FOLLOW_UP_PRIORITY).cloned().collect();
    let summary = summary_message(follow_ups.len(), urgent.len(), overdue.len(), viewings.len());

    DailyBriefing {
        date: now.date_naive(),
        follow_ups_count: follow_ups.len(),
        urgent_follow_ups: urgent.into_iter().take(BRIEFING_HIGHLIGHTS).collect(),
        overdue_tasks_count: overdue.len(),
        urgent_overdue_tasks: overdue.into_iter().take(BRIEFING_HIGHLIGHTS).collect(),
        todays_viewings: viewings,
        summary,
    }
}

fn summary_message(follow_ups: usize, urgent: usize, overdue: usize, viewings: usize) -> String {
    let mut parts = Vec::new();
    if urgent > 0 {
        parts.push(format!("{urgent} urgent follow-ups needed"));
    } else if follow_ups > 0 {
        parts.push(format!("{follow_ups} follow-ups pending"));
    }
    if overdue > 0 {
        parts.push(format!("{overdue} overdue tasks"));
    }
    if viewings > 0 {
        parts.push(format!("{viewings} viewings scheduled today"));
    }

    if parts.is_empty() {
        "You're all caught up! Great job staying on top of your tasks.".to_string()
    } else {
        format!("Today's priorities: {}.", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{
        daily_briefing, latest_interest, overdue_tasks, parse_viewing_time, plan_viewing,
        EmailComposer, DEFAULT_TEMPLATE,
    };
    use crate::domain::contact::{Contact, ContactId, LeadStatus};
    use crate::domain::property::{Property, PropertyId};
    use crate::domain::relationship::{ContactProperty, RelationshipKind};
    use crate::domain::task::{Task, TaskId, TaskPriority, TaskStatus};
    use crate::knowledge::KnowledgeBase;
    use crate::scoring::FollowUpPolicy;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).single().expect("valid date")
    }

    fn task(id: i64, title: &str, status: TaskStatus, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: TaskId(id),
            title: title.to_string(),
            description: None,
            status,
            priority: TaskPriority::Medium,
            contact_id: Some(ContactId(1)),
            property_id: Some(PropertyId(5)),
            created_date: None,
            due_date: due,
            completed_date: None,
        }
    }

    fn palm_tower() -> Property {
        let mut property = Property::new(5, "Palm Tower", "1204");
        property.area = Some("Palm Jumeirah".to_string());
        property
    }

    #[test]
    fn composes_knowledge_template_with_property_interest() {
        let knowledge = KnowledgeBase::default();
        let composer = EmailComposer::new(&knowledge).expect("templates compile");
        let mut contact = Contact::new(1, "Ahmed Al Mansouri", LeadStatus::Hot);
        contact.email = Some("ahmed@example.com".to_string());

        let property = palm_tower();
        let draft = composer.compose(&contact, Some(&property), "follow_up_hot").expect("renders");
        assert_eq!(draft.subject, "Quick follow-up on Palm Tower Unit 1204 in Palm Jumeirah");
        assert!(draft.body.starts_with("Hi Ahmed Al Mansouri,"));
        assert_eq!(draft.to_email.as_deref(), Some("ahmed@example.com"));
    }

    #[test]
    fn unknown_template_falls_back_to_default() {
        let composer = EmailComposer::new(&KnowledgeBase::default()).expect("templates compile");
        let contact = Contact::new(2, "Sara", LeadStatus::Warm);

        let draft = composer.compose(&contact, None, "birthday").expect("renders");
        assert_eq!(draft.template, DEFAULT_TEMPLATE);
        assert_eq!(draft.subject, "Follow-up");
        assert!(draft.body.contains("Hi Sara,"));
    }

    #[test]
    fn broken_template_is_reported_at_construction() {
        let mut knowledge = KnowledgeBase::default();
        knowledge.email_templates[0].body = "Hi {{ name".to_string();
        assert!(EmailComposer::new(&knowledge).is_err());
    }

    #[test]
    fn latest_interest_prefers_the_last_interest_link() {
        let properties = vec![palm_tower(), Property::new(6, "Marina Residences", "12")];
        let links = vec![
            ContactProperty {
                contact_id: ContactId(1),
                property_id: PropertyId(5),
                relationship: RelationshipKind::Interested,
            },
            ContactProperty {
                contact_id: ContactId(1),
                property_id: PropertyId(6),
                relationship: RelationshipKind::ViewingScheduled,
            },
            ContactProperty {
                contact_id: ContactId(1),
                property_id: PropertyId(5),
                relationship: RelationshipKind::Owner,
            },
        ];
        let found = latest_interest(ContactId(1), &links, &properties);
        assert_eq!(found.map(|property| property.id), Some(PropertyId(6)));
        assert!(latest_interest(ContactId(9), &links, &properties).is_none());
    }

    #[test]
    fn overdue_tasks_skip_closed_and_undated_work() {
        let tasks = vec![
            task(1, "Send contract", TaskStatus::Pending, Some(now() - Duration::days(1))),
            task(2, "Call back", TaskStatus::InProgress, Some(now() - Duration::days(4))),
            task(3, "Archive", TaskStatus::Completed, Some(now() - Duration::days(9))),
            task(4, "Someday", TaskStatus::Pending, None),
            task(5, "Tomorrow", TaskStatus::Pending, Some(now() + Duration::days(1))),
        ];
        let contacts = vec![Contact::new(1, "Ahmed", LeadStatus::Hot)];

        let overdue = overdue_tasks(&tasks, &contacts, &[palm_tower()], now());
        let ids: Vec<i64> = overdue.iter().map(|task| task.task_id.0).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(overdue[0].days_overdue, 4);
        assert_eq!(overdue[0].contact_name.as_deref(), Some("Ahmed"));
        assert_eq!(overdue[0].property.as_deref(), Some("Palm Tower Unit 1204"));
    }

    #[test]
    fn briefing_summarises_priorities() {
        let mut hot = Contact::new(1, "Ahmed", LeadStatus::Hot);
        hot.last_contacted_date = Some(now() - Duration::days(3));
        let tasks = vec![
            task(1, "Property viewing", TaskStatus::Pending, Some(now() + Duration::hours(2))),
            task(2, "Send contract", TaskStatus::Pending, Some(now() - Duration::days(2))),
        ];

        let briefing =
            daily_briefing(&FollowUpPolicy::default(), &[hot], &tasks, &[palm_tower()], now());
        assert_eq!(briefing.follow_ups_count, 1);
        assert_eq!(briefing.urgent_follow_ups.len(), 1);
        assert_eq!(briefing.overdue_tasks_count, 1);
        assert_eq!(briefing.todays_viewings.len(), 1);
        assert_eq!(
            briefing.summary,
            "Today's priorities: 1 urgent follow-ups needed, 1 overdue tasks, 1 viewings scheduled today."
        );
    }

    #[test]
    fn empty_day_is_all_caught_up() {
        let briefing = daily_briefing(&FollowUpPolicy::default(), &[], &[], &[], now());
        assert!(briefing.summary.starts_with("You're all caught up!"));
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).single().expect("valid date")
    }

    #[test]
    fn viewing_times_read_days_and_clock_times() {
        assert_eq!(parse_viewing_time("tomorrow at 3pm", now()), Some(at(3, 15, 0)));
        assert_eq!(parse_viewing_time("Villa 42 tomorrow 3:30 pm.", now()), Some(at(3, 15, 30)));
        assert_eq!(parse_viewing_time("on 2026-03-09", now()), Some(at(9, 10, 0)));
        assert_eq!(parse_viewing_time("2026-03-09 at 17:45", now()), Some(at(9, 17, 45)));
        assert_eq!(parse_viewing_time("12am tomorrow", now()), Some(at(3, 0, 0)));
    }

    #[test]
    fn bare_times_roll_to_the_next_occurrence() {
        // now() is 10:00 on the 2nd
        assert_eq!(parse_viewing_time("at 16:00", now()), Some(at(2, 16, 0)));
        assert_eq!(parse_viewing_time("at 9am", now()), Some(at(3, 9, 0)));
    }

    #[test]
    fn text_without_a_slot_or_with_bad_clock_values_has_no_time() {
        assert_eq!(parse_viewing_time("Garden Homes Villa 42", now()), None);
        assert_eq!(parse_viewing_time("at 13pm", now()), None);
        assert_eq!(parse_viewing_time("at 25:00", now()), None);
    }

    #[test]
    fn planned_viewing_is_a_high_priority_task_and_a_viewing_link() {
        let contact = Contact::new(2, "Fatima Al Habtoor", LeadStatus::Warm);
        let viewing = plan_viewing(&contact, &palm_tower(), at(3, 15, 0), now()).expect("future");

        assert_eq!(viewing.task.title, "Property viewing: Palm Tower Unit 1204");
        assert_eq!(
            viewing.task.description.as_deref(),
            Some("Viewing with Fatima Al Habtoor at Palm Tower Unit 1204 on 2026-03-03 15:00")
        );
        assert_eq!(viewing.task.priority, TaskPriority::High);
        assert_eq!(viewing.task.due_date, Some(at(3, 15, 0)));
        assert_eq!(viewing.task.contact_id, Some(ContactId(2)));
        assert_eq!(
            viewing.link,
            ContactProperty {
                contact_id: ContactId(2),
                property_id: PropertyId(5),
                relationship: RelationshipKind::ViewingScheduled,
            }
        );
    }

    #[test]
    fn viewings_in_the_past_are_rejected() {
        let contact = Contact::new(2, "Fatima Al Habtoor", LeadStatus::Warm);
        assert!(plan_viewing(&contact, &palm_tower(), at(1, 15, 0), now()).is_err());
        assert!(plan_viewing(&contact, &palm_tower(), now(), now()).is_err());
    }
}
