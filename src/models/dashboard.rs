//! Records returned by the dashboard, whitelist and admin endpoints.
//!
//! Every field the dashboard can live without is defaulted, so a partial
//! row renders as "unknown" instead of failing the whole response.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analytics {
    #[serde(default)]
    pub drift_events: Vec<DriftEvent>,
    #[serde(default)]
    pub domain_summaries: Vec<DomainSummary>,
    #[serde(default)]
    pub category_totals: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftEvent {
    #[serde(default)]
    pub drift_id: Option<i64>,
    #[serde(default)]
    pub drift_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub event_start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub event_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainSummary {
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub summary_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_seconds_focused: Option<f64>,
    #[serde(default)]
    pub total_events: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTotal {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub total_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub unclassified_domains: Vec<UnclassifiedDomain>,
    #[serde(default)]
    pub session_productivity: Vec<SessionProductivity>,
    #[serde(default)]
    pub driftiest_hours: Vec<DriftHour>,
    #[serde(default)]
    pub stickiest_distractions: Vec<StickyDistraction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnclassifiedDomain {
    pub domain_name: String,
    #[serde(default)]
    pub domain_id: Option<i64>,
    #[serde(default)]
    pub total_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionProductivity {
    pub sid: i64,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_minutes: Option<i64>,
    #[serde(default)]
    pub tab_switches: Option<i64>,
    #[serde(default)]
    pub productive_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftHour {
    pub drift_hour: u32,
    #[serde(default)]
    pub total_drifts: i64,
    #[serde(default)]
    pub most_common_drift_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StickyDistraction {
    pub domain_name: String,
    #[serde(default)]
    pub avg_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntry {
    #[serde(default)]
    pub wid: Option<i64>,
    pub domain_id: i64,
    pub domain_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub user_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhitelistResponse {
    #[serde(default)]
    pub whitelist: Vec<WhitelistEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhitelistRequest {
    pub domain_name: String,
    pub user_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhitelistAdded {
    #[serde(default)]
    pub domain_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: i64,
    #[serde(default)]
    pub active_users: i64,
    #[serde(default)]
    pub total_sessions: i64,
    #[serde(default)]
    pub total_drifts: i64,
    #[serde(default)]
    pub avg_session_duration_minutes: f64,
    #[serde(default)]
    pub top_domains: Vec<AdminDomain>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminDomain {
    pub domain: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub total_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_count: i64,
    #[serde(default)]
    pub drift_count: i64,
}

/// The backend emits naive `YYYY-MM-DDTHH:MM:SS` timestamps (UTC) as well
/// as RFC 3339; anything unparseable becomes `None`.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| parse_timestamp(&value)))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let day = value.get(..10).unwrap_or(&value);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }))
}

pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
