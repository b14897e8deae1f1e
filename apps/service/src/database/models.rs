use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Monitor model - a target endpoint that is checked on a fixed interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub interval_seconds: u64,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Monitor {
    /// A monitor is due when it was never checked, or once its interval has
    /// fully elapsed since the last check. A next-check time past the end of
    /// the calendar counts as due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked_at {
            None => true,
            Some(last) => last.checked_add_signed(self.interval()).is_none_or(|next| now >= next),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.interval_seconds).unwrap_or(i64::MAX / 1000))
    }
}

/// Fields accepted when registering a monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMonitor {
    pub name: String,
    pub url: String,
    pub interval_seconds: u64,
}

/// Webhook destination for transition notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWebhook {
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

/// A persisted check, append-only until the retention sweep removes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: i64,
    pub monitor_id: i64,
    /// 0 when the check never got an HTTP response
    pub status_code: u16,
    pub latency_ms: u64,
    pub is_up: bool,
    pub checked_at: DateTime<Utc>,
}

/// Per-monitor, per-day rollup of check counts and latency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub monitor_id: i64,
    pub date: NaiveDate,
    pub up_count: u64,
    pub total_count: u64,
    pub total_latency_ms: u64,
}

impl DailyAggregate {
    pub fn uptime_pct(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.up_count as f64 / self.total_count as f64 * 100.0
    }

    pub fn avg_latency_ms(&self) -> u64 {
        if self.total_count == 0 {
            return 0;
        }
        self.total_latency_ms / self.total_count
    }

    pub fn to_stat(&self) -> DailyStat {
        DailyStat {
            monitor_id: self.monitor_id,
            date: self.date,
            uptime_pct: self.uptime_pct(),
            avg_latency_ms: self.avg_latency_ms(),
        }
    }
}

/// Read-side view of a [`DailyAggregate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub monitor_id: i64,
    pub date: NaiveDate,
    pub uptime_pct: f64,
    pub avg_latency_ms: u64,
}

/// Uptime over a window of daily aggregates, weighted by check count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub monitor_id: i64,
    pub days: usize,
    pub uptime_pct: f64,
}

impl MonitorSummary {
    pub fn from_history(monitor_id: i64, history: &[DailyAggregate]) -> Self {
        let (up, total) = history
            .iter()
            .fold((0u64, 0u64), |(up, total), day| (up + day.up_count, total + day.total_count));

        let uptime_pct = if total == 0 { 0.0 } else { up as f64 / total as f64 * 100.0 };

        Self { monitor_id, days: history.len(), uptime_pct }
    }
}

/// Convert a stored unix timestamp back to UTC
pub(crate) fn from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| anyhow!("timestamp out of range: {seconds}"))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
}
