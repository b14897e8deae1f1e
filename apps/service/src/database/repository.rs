use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use libsql::{Connection, Row, params};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

use super::models::{
    CheckRecord, DailyAggregate, DailyStat, Monitor, MonitorSummary, NewMonitor, NewWebhook, Webhook,
    format_date, from_unix, parse_date,
};
use crate::monitoring::types::CheckResult;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Days of aggregates served to the reporting layer
pub const HISTORY_DAYS: i64 = 30;

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Get every registered monitor
    async fn list_monitors(&self) -> Result<Vec<Monitor>>;

    /// Validate and register a monitor, returning its id
    async fn create_monitor(&self, monitor: &NewMonitor) -> Result<i64>;

    /// Delete a monitor together with its checks and aggregates
    async fn delete_monitor(&self, id: i64) -> Result<()>;

    /// Stamp the monitor as checked at `at`
    async fn mark_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Validate and register a webhook, returning its id
    async fn create_webhook(&self, webhook: &NewWebhook) -> Result<i64>;

    async fn list_enabled_webhooks(&self) -> Result<Vec<Webhook>>;

    /// Append a check and fold it into the day's aggregate as one unit of
    /// work: either both land or neither does.
    async fn save_check_atomic(
        &self,
        monitor_id: i64,
        result: &CheckResult,
        checked_at: DateTime<Utc>,
    ) -> Result<CheckRecord>;

    /// Delete checks older than `age`, returning how many were removed
    async fn delete_checks_older_than(&self, age: Duration) -> Result<u64>;

    /// Most recent checks per monitor, newest first, at most `limit_per_monitor` each
    async fn get_recent_checks(&self, limit_per_monitor: usize) -> Result<HashMap<i64, Vec<CheckRecord>>>;

    async fn get_daily_aggregate(&self, monitor_id: i64, date: NaiveDate) -> Result<Option<DailyAggregate>>;

    /// Up to 30 most recent days for one monitor, newest first
    async fn get_monitor_history(&self, monitor_id: i64) -> Result<Vec<DailyStat>>;

    /// Count-weighted uptime over the same days `get_monitor_history` returns
    async fn get_monitor_summary(&self, monitor_id: i64) -> Result<MonitorSummary>;

    /// Days within the 30-day window ending at `today`, grouped by monitor
    async fn get_all_monitor_history(&self, today: NaiveDate) -> Result<HashMap<i64, Vec<DailyStat>>>;
}

/// LibSQL database implementation
///
/// The embedded store takes one writer at a time, so every write goes
/// through `write_lock`. Reads use pooled connections without it.
pub struct DatabaseImpl {
    pool: LibsqlPool,
    write_lock: Mutex<()>,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool, write_lock: Mutex::new(()) }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    fn monitor_from_row(row: &Row) -> Result<Monitor> {
        Ok(Monitor {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            interval_seconds: row.get::<i64>(3)? as u64,
            last_checked_at: row.get::<Option<i64>>(4)?.map(from_unix).transpose()?,
        })
    }

    fn check_from_row(row: &Row) -> Result<CheckRecord> {
        Ok(CheckRecord {
            id: row.get(0)?,
            monitor_id: row.get(1)?,
            status_code: row.get::<i64>(2)? as u16,
            latency_ms: row.get::<i64>(3)? as u64,
            is_up: row.get::<i64>(4)? != 0,
            checked_at: from_unix(row.get(5)?)?,
        })
    }

    fn aggregate_from_row(row: &Row) -> Result<DailyAggregate> {
        let date: String = row.get(1)?;
        Ok(DailyAggregate {
            monitor_id: row.get(0)?,
            date: parse_date(&date)?,
            up_count: row.get::<i64>(2)? as u64,
            total_count: row.get::<i64>(3)? as u64,
            total_latency_ms: row.get::<i64>(4)? as u64,
        })
    }

    async fn recent_aggregates(&self, monitor_id: i64) -> Result<Vec<DailyAggregate>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT monitor_id, date, up_count, total_count, total_latency
                 FROM daily_stats
                 WHERE monitor_id = ?
                 ORDER BY date DESC
                 LIMIT ?",
                params![monitor_id, HISTORY_DAYS],
            )
            .await?;

        let mut aggregates = Vec::new();
        while let Some(row) = rows.next().await? {
            aggregates.push(Self::aggregate_from_row(&row)?);
        }
        Ok(aggregates)
    }

    /// Both halves of `save_check_atomic`, run inside the caller's transaction
    async fn insert_check_and_aggregate(
        conn: &Connection,
        monitor_id: i64,
        result: &CheckResult,
        checked_at: DateTime<Utc>,
    ) -> Result<i64> {
        let latency = result.latency_ms as i64;
        let up_increment: i64 = if result.is_up { 1 } else { 0 };

        conn.execute(
            "INSERT INTO checks (monitor_id, status_code, latency_ms, is_up, checked_at) VALUES (?, ?, ?, ?, ?)",
            params![monitor_id, result.status_code as i64, latency, up_increment, checked_at.timestamp()],
        )
        .await
        .context("failed to append check")?;
        let check_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO daily_stats (monitor_id, date, up_count, total_count, total_latency)
             VALUES (?, ?, ?, 1, ?)
             ON CONFLICT(monitor_id, date) DO UPDATE SET
                up_count = up_count + excluded.up_count,
                total_count = total_count + 1,
                total_latency = total_latency + excluded.total_latency",
            params![monitor_id, format_date(checked_at.date_naive()), up_increment, latency],
        )
        .await
        .context("failed to update daily aggregate")?;

        Ok(check_id)
    }
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, name, url, interval_seconds, last_checked_at FROM monitors ORDER BY id", ())
            .await?;

        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(Self::monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn create_monitor(&self, monitor: &NewMonitor) -> Result<i64> {
        monitor.validate()?;

        let _writer = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO monitors (name, url, interval_seconds, created_at) VALUES (?, ?, ?, ?)",
            params![
                monitor.name.clone(),
                monitor.url.clone(),
                monitor.interval_seconds as i64,
                Utc::now().timestamp()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn delete_monitor(&self, id: i64) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let conn = self.get_conn().await?;

        // checks and daily_stats rows go with it via ON DELETE CASCADE
        conn.execute("DELETE FROM monitors WHERE id = ?", params![id]).await?;
        Ok(())
    }

    async fn mark_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute("UPDATE monitors SET last_checked_at = ? WHERE id = ?", params![at.timestamp(), id])
            .await?;
        Ok(())
    }

    async fn create_webhook(&self, webhook: &NewWebhook) -> Result<i64> {
        webhook.validate()?;

        let _writer = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO webhooks (name, url, enabled, created_at) VALUES (?, ?, ?, ?)",
            params![
                webhook.name.clone(),
                webhook.url.clone(),
                i64::from(webhook.enabled),
                Utc::now().timestamp()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn list_enabled_webhooks(&self) -> Result<Vec<Webhook>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, name, url, enabled FROM webhooks WHERE enabled = 1 ORDER BY id ASC", ())
            .await?;

        let mut webhooks = Vec::new();
        while let Some(row) = rows.next().await? {
            webhooks.push(Webhook {
                id: row.get(0)?,
                name: row.get(1)?,
                url: row.get(2)?,
                enabled: row.get::<i64>(3)? != 0,
            });
        }
        Ok(webhooks)
    }

    async fn save_check_atomic(
        &self,
        monitor_id: i64,
        result: &CheckResult,
        checked_at: DateTime<Utc>,
    ) -> Result<CheckRecord> {
        let _writer = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        match Self::insert_check_and_aggregate(&tx, monitor_id, result, checked_at).await {
            Ok(id) => {
                tx.commit().await.context("failed to commit check")?;
                // stored at second precision
                let checked_at = from_unix(checked_at.timestamp())?;
                Ok(CheckRecord {
                    id,
                    monitor_id,
                    status_code: result.status_code,
                    latency_ms: result.latency_ms,
                    is_up: result.is_up,
                    checked_at,
                })
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(monitor_id, "Rollback after failed check save also failed: {}", rollback_error);
                }
                Err(e)
            }
        }
    }

    async fn delete_checks_older_than(&self, age: Duration) -> Result<u64> {
        let cutoff = (Utc::now() - age).timestamp();

        let _writer = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let deleted = conn.execute("DELETE FROM checks WHERE checked_at < ?", params![cutoff]).await?;
        Ok(deleted)
    }

    async fn get_recent_checks(&self, limit_per_monitor: usize) -> Result<HashMap<i64, Vec<CheckRecord>>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, monitor_id, status_code, latency_ms, is_up, checked_at
                 FROM (
                    SELECT *, ROW_NUMBER() OVER (
                        PARTITION BY monitor_id ORDER BY checked_at DESC, id DESC
                    ) AS rn
                    FROM checks
                 )
                 WHERE rn <= ?
                 ORDER BY monitor_id, checked_at DESC, id DESC",
                params![limit_per_monitor as i64],
            )
            .await?;

        let mut grouped: HashMap<i64, Vec<CheckRecord>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let check = Self::check_from_row(&row)?;
            grouped.entry(check.monitor_id).or_default().push(check);
        }

        Ok(grouped)
    }

    async fn get_daily_aggregate(&self, monitor_id: i64, date: NaiveDate) -> Result<Option<DailyAggregate>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT monitor_id, date, up_count, total_count, total_latency
                 FROM daily_stats WHERE monitor_id = ? AND date = ?",
                params![monitor_id, format_date(date)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::aggregate_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_monitor_history(&self, monitor_id: i64) -> Result<Vec<DailyStat>> {
        let aggregates = self.recent_aggregates(monitor_id).await?;
        Ok(aggregates.iter().map(DailyAggregate::to_stat).collect())
    }

    async fn get_monitor_summary(&self, monitor_id: i64) -> Result<MonitorSummary> {
        let aggregates = self.recent_aggregates(monitor_id).await?;
        Ok(MonitorSummary::from_history(monitor_id, &aggregates))
    }

    async fn get_all_monitor_history(&self, today: NaiveDate) -> Result<HashMap<i64, Vec<DailyStat>>> {
        let since = today - Duration::days(HISTORY_DAYS);

        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT monitor_id, date, up_count, total_count, total_latency
                 FROM daily_stats
                 WHERE date >= ?
                 ORDER BY monitor_id, date DESC",
                params![format_date(since)],
            )
            .await?;

        let mut grouped: HashMap<i64, Vec<DailyStat>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let stat = Self::aggregate_from_row(&row)?.to_stat();
            grouped.entry(stat.monitor_id).or_default().push(stat);
        }
        Ok(grouped)
    }
}
