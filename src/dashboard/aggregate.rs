//! Pure reductions of dashboard responses into report-ready tables.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{CategoryTotal, DomainSummary, DriftEvent};

pub const DEFAULT_TOP_DOMAINS: usize = 10;
pub const ACTIVITY_TOP_DOMAINS: usize = 5;

const UNKNOWN: &str = "Unknown";
const NEUTRAL: &str = "Neutral";

fn to_minutes(seconds: f64) -> i64 {
    (seconds / 60.0).round() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySlice {
    pub category: String,
    pub minutes: i64,
    pub seconds: f64,
    /// Share of all tracked seconds, 0-100.
    pub percent: f64,
}

/// One slice per category, largest first.
pub fn category_breakdown(totals: &[CategoryTotal]) -> Vec<CategorySlice> {
    let all_seconds: f64 = totals
        .iter()
        .map(|total| total.total_seconds.unwrap_or(0.0))
        .sum();

    let mut slices: Vec<CategorySlice> = totals
        .iter()
        .map(|total| {
            let seconds = total.total_seconds.unwrap_or(0.0);
            CategorySlice {
                category: total.category.clone().unwrap_or_else(|| UNKNOWN.into()),
                minutes: to_minutes(seconds),
                seconds,
                percent: if all_seconds > 0.0 {
                    seconds / all_seconds * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    slices.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    slices
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainDay {
    pub date: NaiveDate,
    pub minutes: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainActivity {
    /// Ascending by date.
    pub days: Vec<DomainDay>,
    pub top_domains: Vec<String>,
}

/// Minutes per domain per day. Summaries without a date count toward
/// `today`.
pub fn domain_activity(summaries: &[DomainSummary], today: NaiveDate) -> DomainActivity {
    let mut by_day: BTreeMap<NaiveDate, BTreeMap<String, i64>> = BTreeMap::new();
    let mut totals: HashMap<String, i64> = HashMap::new();

    for summary in summaries {
        let date = summary.summary_date.unwrap_or(today);
        let domain = summary
            .domain_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.into());
        let minutes = to_minutes(summary.total_seconds_focused.unwrap_or(0.0));

        *by_day.entry(date).or_default().entry(domain.clone()).or_insert(0) += minutes;
        *totals.entry(domain).or_insert(0) += minutes;
    }

    let mut ranked: Vec<(String, i64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(ACTIVITY_TOP_DOMAINS);

    DomainActivity {
        days: by_day
            .into_iter()
            .map(|(date, minutes)| DomainDay { date, minutes })
            .collect(),
        top_domains: ranked.into_iter().map(|(domain, _)| domain).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainTotal {
    pub domain: String,
    pub category: String,
    pub minutes: i64,
    pub events: i64,
}

/// Per-domain totals, `limit` largest by minutes. Minutes are rounded per
/// summary row before summing; the category is the first one seen.
pub fn top_domains(summaries: &[DomainSummary], limit: usize) -> Vec<DomainTotal> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, DomainTotal> = HashMap::new();

    for summary in summaries {
        let domain = summary
            .domain_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.into());

        let entry = totals.entry(domain.clone()).or_insert_with(|| {
            order.push(domain.clone());
            DomainTotal {
                domain,
                category: summary.category.clone().unwrap_or_else(|| NEUTRAL.into()),
                minutes: 0,
                events: 0,
            }
        });
        entry.minutes += to_minutes(summary.total_seconds_focused.unwrap_or(0.0));
        entry.events += summary.total_events.unwrap_or(0);
    }

    let mut ranked: Vec<DomainTotal> = order
        .into_iter()
        .filter_map(|domain| totals.remove(&domain))
        .collect();
    ranked.sort_by(|a, b| b.minutes.cmp(&a.minutes).then_with(|| a.domain.cmp(&b.domain)));
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftTypeTotal {
    pub drift_type: String,
    pub count: usize,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftDay {
    pub date: NaiveDate,
    pub totals: Vec<DriftTypeTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftTimeline {
    pub days: Vec<DriftDay>,
    /// Every drift type, in the order first seen.
    pub types: Vec<String>,
}

/// Drift counts and durations per UTC day and type. Events without a start
/// time are left out.
pub fn drift_timeline(events: &[DriftEvent]) -> DriftTimeline {
    let mut types: Vec<String> = Vec::new();
    let mut by_day: BTreeMap<NaiveDate, Vec<DriftTypeTotal>> = BTreeMap::new();

    for event in events {
        let Some(start) = event.event_start else {
            continue;
        };
        let drift_type = event.drift_type.clone().unwrap_or_else(|| UNKNOWN.into());
        if !types.contains(&drift_type) {
            types.push(drift_type.clone());
        }

        let day = by_day.entry(start.date_naive()).or_default();
        let duration = event.duration_seconds.unwrap_or(0.0);
        match day.iter_mut().find(|total| total.drift_type == drift_type) {
            Some(total) => {
                total.count += 1;
                total.duration_seconds += duration;
            }
            None => day.push(DriftTypeTotal {
                drift_type,
                count: 1,
                duration_seconds: duration,
            }),
        }
    }

    let days = by_day
        .into_iter()
        .map(|(date, mut totals)| {
            totals.sort_by_key(|total| types.iter().position(|t| *t == total.drift_type));
            DriftDay { date, totals }
        })
        .collect();

    DriftTimeline { days, types }
}
