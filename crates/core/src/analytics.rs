//! Market and performance analytics over storage snapshots, plus the CRM
//! summary handed to the text generator.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::contact::Contact;
use crate::domain::deal::{Deal, DealStatus};
use crate::domain::property::Property;
use crate::domain::task::{Task, TaskStatus};

const OVERALL_MARKET: &str = "Overall Market";
const UNSPECIFIED_TYPE: &str = "Unspecified";
const RECENT_WINDOW_DAYS: i64 = 30;
const DEAL_SIZE_WINDOW_DAYS: i64 = 90;
const SNAPSHOT_RECENT_LISTINGS: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeInsight {
    pub property_type: String,
    pub count: usize,
    /// Listings without a price are counted but excluded from price figures.
    pub average_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub average_size_sqft: Option<f64>,
    pub price_per_sqft: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarketInsights {
    pub area: String,
    pub property_types: Vec<TypeInsight>,
    pub total_properties: usize,
    pub average_market_price: Option<Decimal>,
    pub most_common_type: Option<String>,
}

/// Insights over available listings, optionally restricted to areas whose
/// name contains `area` (case-insensitive).
pub fn market_insights(properties: &[Property], area: Option<&str>) -> MarketInsights {
    let area_filter = area.map(|value| value.trim().to_lowercase()).filter(|value| !value.is_empty());
    let mut groups: BTreeMap<String, Vec<&Property>> = BTreeMap::new();
    for property in properties.iter().filter(|property| property.is_available()) {
        if let Some(wanted) = &area_filter {
            let matches = property
                .area
                .as_deref()
                .map(|name| name.to_lowercase().contains(wanted.as_str()))
                .unwrap_or(false);
            if !matches {
                continue;
            }
        }
        let kind = property.property_type.clone().unwrap_or_else(|| UNSPECIFIED_TYPE.to_string());
        groups.entry(kind).or_default().push(property);
    }

    let property_types: Vec<TypeInsight> =
        groups.into_iter().map(|(kind, members)| type_insight(kind, &members)).collect();

    let total_properties = property_types.iter().map(|insight| insight.count).sum();
    let priced: Vec<Decimal> = properties
        .iter()
        .filter(|property| property.is_available())
        .filter(|property| {
            area_filter.as_ref().map_or(true, |wanted| {
                property.area.as_deref().is_some_and(|name| name.to_lowercase().contains(wanted.as_str()))
            })
        })
        .filter_map(|property| property.price)
        .collect();

    let most_common_type = property_types
        .iter()
        .max_by(|left, right| {
            left.count.cmp(&right.count).then_with(|| right.property_type.cmp(&left.property_type))
        })
        .map(|insight| insight.property_type.clone());

    MarketInsights {
        area: area.map(str::to_string).unwrap_or_else(|| OVERALL_MARKET.to_string()),
        property_types,
        total_properties,
        average_market_price: average(&priced),
        most_common_type,
    }
}

fn type_insight(property_type: String, members: &[&Property]) -> TypeInsight {
    let prices: Vec<Decimal> = members.iter().filter_map(|property| property.price).collect();
    let sizes: Vec<f64> = members.iter().filter_map(|property| property.size_sqft).collect();
    let average_price = average(&prices);
    let average_size_sqft = if sizes.is_empty() {
        None
    } else {
        Some(round2(sizes.iter().sum::<f64>() / sizes.len() as f64))
    };
    let price_per_sqft = match (average_price, average_size_sqft) {
        (Some(price), Some(size)) if size > 0.0 => {
            Decimal::from_f64(size).and_then(|size| price.checked_div(size)).map(|value| value.round_dp(2))
        }
        _ => None,
    };

    TypeInsight {
        property_type,
        count: members.len(),
        average_price,
        min_price: prices.iter().min().copied(),
        max_price: prices.iter().max().copied(),
        average_size_sqft,
        price_per_sqft,
    }
}

fn average(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let total: Decimal = values.iter().sum();
    Some((total / Decimal::from(values.len())).round_dp(2))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub active_deals: usize,
    pub deals_closed_30_days: usize,
    pub revenue_30_days: Decimal,
    pub commission_30_days: Decimal,
    pub pipeline_value: Decimal,
    /// Percentage of contacts with at least one deal.
    pub conversion_rate: f64,
    pub average_deal_size: Option<Decimal>,
    /// Percentage of tasks created in the last 30 days that were completed.
    pub task_completion_rate: f64,
}

pub fn performance_metrics(
    contacts: &[Contact],
    deals: &[Deal],
    tasks: &[Task],
    now: DateTime<Utc>,
) -> PerformanceMetrics {
    let recent_start = now - Duration::days(RECENT_WINDOW_DAYS);
    let deal_size_start = now - Duration::days(DEAL_SIZE_WINDOW_DAYS);
    let closed_since = |start: DateTime<Utc>| {
        deals.iter().filter(move |deal| {
            deal.status == DealStatus::Closed && deal.closing_date.is_some_and(|closed| closed >= start)
        })
    };

    let open: Vec<&Deal> = deals.iter().filter(|deal| deal.status.is_open()).collect();
    let closed_recent: Vec<&Deal> = closed_since(recent_start).collect();
    let closed_values: Vec<Decimal> = closed_since(deal_size_start).map(|deal| deal.deal_value).collect();

    let contacts_with_deals: HashSet<_> = deals.iter().map(|deal| deal.contact_id).collect();
    let created_recent = tasks
        .iter()
        .filter(|task| task.created_date.is_some_and(|created| created >= recent_start))
        .count();
    let completed_recent = tasks
        .iter()
        .filter(|task| {
            task.status == TaskStatus::Completed
                && task.completed_date.is_some_and(|completed| completed >= recent_start)
        })
        .count();

    PerformanceMetrics {
        active_deals: open.len(),
        deals_closed_30_days: closed_recent.len(),
        revenue_30_days: closed_recent.iter().map(|deal| deal.deal_value).sum(),
        commission_30_days: closed_recent.iter().filter_map(|deal| deal.commission).sum(),
        pipeline_value: open.iter().map(|deal| deal.deal_value).sum(),
        conversion_rate: percentage(contacts_with_deals.len(), contacts.len()),
        average_deal_size: average(&closed_values),
        task_completion_rate: percentage(completed_recent, created_recent),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Whole dirhams with thousands separators, e.g. `AED 2,500,000`.
pub fn format_aed(value: Decimal) -> String {
    let rounded = value.round().to_string();
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("AED {sign}{grouped}")
}

/// Portfolio counts and the newest listings, given to the text generator so
/// free-form answers can refer to the agent's own data.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrmSnapshot {
    pub total_properties: usize,
    pub total_contacts: usize,
    /// Deals in the `Active` state only.
    pub active_deals: usize,
    /// Tasks in the `Pending` state only.
    pub pending_tasks: usize,
    /// Highest ids first.
    pub recent_properties: Vec<Property>,
}

impl CrmSnapshot {
    pub fn render(&self) -> String {
        let mut text = format!(
            "Database Summary:\n\
             - Total Properties: {}\n\
             - Total Contacts: {}\n\
             - Active Deals: {}\n\
             - Pending Tasks: {}\n\n\
             Recent Properties:\n",
            self.total_properties, self.total_contacts, self.active_deals, self.pending_tasks
        );
        if self.recent_properties.is_empty() {
            text.push_str("- none\n");
        }
        for property in &self.recent_properties {
            text.push_str(&format!("- {}", property.label()));
            if let Some(area) = property.area.as_deref() {
                text.push_str(&format!(" in {area}"));
            }
            if let Some(price) = property.price {
                text.push_str(&format!(" - {}", format_aed(price)));
            }
            text.push('\n');
        }
        text
    }
}

pub fn crm_snapshot(
    properties: &[Property],
    contacts: &[Contact],
    deals: &[Deal],
    tasks: &[Task],
) -> CrmSnapshot {
    let mut recent: Vec<Property> = properties.to_vec();
    recent.sort_by(|left, right| right.id.cmp(&left.id));
    recent.truncate(SNAPSHOT_RECENT_LISTINGS);

    CrmSnapshot {
        total_properties: properties.len(),
        total_contacts: contacts.len(),
        active_deals: deals.iter().filter(|deal| deal.status == DealStatus::Active).count(),
        pending_tasks: tasks.iter().filter(|task| task.status == TaskStatus::Pending).count(),
        recent_properties: recent,
    }
}
