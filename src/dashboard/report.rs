//! Plain-text renderings for the terminal.

use std::fmt;

use chrono::NaiveDate;

use super::aggregate::{
    category_breakdown, domain_activity, drift_timeline, top_domains, DEFAULT_TOP_DOMAINS,
};
use crate::models::{AdminStats, AdminUser, Analytics, Insights, WhitelistEntry};

const RECENT_DRIFTS: usize = 10;

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub struct AnalyticsReport<'a> {
    pub analytics: &'a Analytics,
    pub period_days: u32,
    pub today: NaiveDate,
}

impl fmt::Display for AnalyticsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analytics = self.analytics;
        writeln!(f, "Session report, last {} days", self.period_days)?;

        writeln!(f, "\nTime by category")?;
        let slices = category_breakdown(&analytics.category_totals);
        if slices.is_empty() {
            writeln!(f, "  No category data available.")?;
        }
        for slice in &slices {
            writeln!(
                f,
                "  {:<16} {:>5} min  {:>3.0}%",
                slice.category, slice.minutes, slice.percent
            )?;
        }

        writeln!(f, "\nTop domains")?;
        let domains = top_domains(&analytics.domain_summaries, DEFAULT_TOP_DOMAINS);
        if domains.is_empty() {
            writeln!(f, "  No domain activity data available.")?;
        }
        for domain in &domains {
            writeln!(
                f,
                "  {:<32} {:>5} min  {:>6} events  {}",
                domain.domain, domain.minutes, domain.events, domain.category
            )?;
        }

        let activity = domain_activity(&analytics.domain_summaries, self.today);
        if !activity.days.is_empty() {
            writeln!(f, "\nDaily activity ({})", activity.top_domains.join(", "))?;
            for day in &activity.days {
                let cells: Vec<String> = activity
                    .top_domains
                    .iter()
                    .map(|domain| format!("{}", day.minutes.get(domain).copied().unwrap_or(0)))
                    .collect();
                writeln!(f, "  {}  {}", day.date.format("%b %d"), cells.join(" / "))?;
            }
        }

        writeln!(f, "\nDrift timeline")?;
        let timeline = drift_timeline(&analytics.drift_events);
        if timeline.days.is_empty() {
            writeln!(f, "  No drift events to display.")?;
        }
        for day in &timeline.days {
            let parts: Vec<String> = day
                .totals
                .iter()
                .map(|total| {
                    format!(
                        "{} x{} ({:.1} min)",
                        total.drift_type,
                        total.count,
                        total.duration_seconds / 60.0
                    )
                })
                .collect();
            writeln!(f, "  {}  {}", day.date.format("%b %d"), parts.join(", "))?;
        }

        if !analytics.drift_events.is_empty() {
            writeln!(f, "\nRecent drifts")?;
            for drift in analytics.drift_events.iter().take(RECENT_DRIFTS) {
                let start = drift
                    .event_start
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                writeln!(
                    f,
                    "  {start}  {:<20} {:<8} {}",
                    or_dash(drift.drift_type.as_deref()),
                    or_dash(drift.severity.as_deref()),
                    or_dash(drift.description.as_deref())
                )?;
            }
        }
        Ok(())
    }
}

pub struct InsightsReport<'a>(pub &'a Insights);

impl fmt::Display for InsightsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let insights = self.0;

        writeln!(f, "Unclassified domains")?;
        if insights.unclassified_domains.is_empty() {
            writeln!(f, "  All visited domains are classified.")?;
        }
        for domain in &insights.unclassified_domains {
            let minutes = domain.total_time_seconds.unwrap_or(0.0) / 60.0;
            writeln!(f, "  {:<32} {:>6.1} min", domain.domain_name, minutes)?;
        }

        writeln!(f, "\nSession productivity")?;
        if insights.session_productivity.is_empty() {
            writeln!(f, "  No sessions yet.")?;
        }
        for session in &insights.session_productivity {
            let started = session
                .start_time
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into());
            let total_minutes = session.total_minutes.unwrap_or(0);
            let productive_minutes = session.productive_seconds.unwrap_or(0.0) / 60.0;
            writeln!(
                f,
                "  #{:<6} {started}  {:>4} min  {:>6.1} productive  {:>4} switches",
                session.sid,
                total_minutes,
                productive_minutes,
                session.tab_switches.unwrap_or(0)
            )?;
        }

        writeln!(f, "\nDriftiest hours")?;
        if insights.driftiest_hours.is_empty() {
            writeln!(f, "  No drifts recorded.")?;
        }
        for hour in &insights.driftiest_hours {
            writeln!(
                f,
                "  {:02}:00  {:>4} drifts  {}",
                hour.drift_hour,
                hour.total_drifts,
                or_dash(hour.most_common_drift_type.as_deref())
            )?;
        }

        writeln!(f, "\nStickiest distractions")?;
        if insights.stickiest_distractions.is_empty() {
            writeln!(f, "  None.")?;
        }
        for distraction in &insights.stickiest_distractions {
            let minutes = distraction.avg_duration_seconds.unwrap_or(0.0) / 60.0;
            writeln!(
                f,
                "  {:<32} {:>6.1} min avg",
                distraction.domain_name, minutes
            )?;
        }
        Ok(())
    }
}

pub struct WhitelistReport<'a>(pub &'a [WhitelistEntry]);

impl fmt::Display for WhitelistReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "Whitelist is empty.");
        }
        for entry in self.0 {
            writeln!(
                f,
                "{:>6}  {:<32} {:<14} {}",
                entry.domain_id,
                entry.domain_name,
                or_dash(entry.category.as_deref()),
                or_dash(entry.user_reason.as_deref())
            )?;
        }
        Ok(())
    }
}

pub struct AdminReport<'a> {
    pub stats: &'a AdminStats,
    pub users: &'a [AdminUser],
}

impl fmt::Display for AdminReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        writeln!(f, "Users: {} ({} active)", stats.total_users, stats.active_users)?;
        writeln!(f, "Sessions: {}", stats.total_sessions)?;
        writeln!(f, "Drifts: {}", stats.total_drifts)?;
        writeln!(
            f,
            "Average session: {:.1} min",
            stats.avg_session_duration_minutes
        )?;

        if !stats.top_domains.is_empty() {
            writeln!(f, "\nTop domains")?;
            for domain in &stats.top_domains {
                writeln!(
                    f,
                    "  {:<32} {:>8.1} min  {}",
                    domain.domain,
                    domain.total_seconds / 60.0,
                    or_dash(domain.category.as_deref())
                )?;
            }
        }

        writeln!(f, "\nAccounts")?;
        for user in self.users {
            let created = user
                .created_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".into());
            writeln!(
                f,
                "  {:>5}  {:<32} {created}  {:>4} sessions  {:>4} drifts",
                user.id, user.email, user.session_count, user.drift_count
            )?;
        }
        Ok(())
    }
}
