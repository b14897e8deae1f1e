//! Automatic retention and cleanup of check records.
//!
//! Raw checks are kept for a fixed window (7 days by default) and then
//! deleted in one sweep. Daily aggregates are not touched, so history stays
//! available after the checks behind it are gone.
//!
//! Cleanup runs periodically (hourly by default) as a background task.

use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::Database;

/// Retention policy for check records
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep raw check records
    pub check_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { check_days: 7 }
    }
}

impl RetentionPolicy {
    pub fn check_retention(&self) -> Duration {
        Duration::days(self.check_days)
    }
}

/// Cleanup manager for expired checks
pub struct RetentionCleanup {
    database: Arc<dyn Database>,
    policy: RetentionPolicy,
    interval: std::time::Duration,
}

impl RetentionCleanup {
    /// Create a new retention cleanup manager
    pub fn new(database: Arc<dyn Database>, policy: RetentionPolicy, interval: std::time::Duration) -> Self {
        Self { database, policy, interval }
    }

    /// Delete every check older than the retention window
    pub async fn cleanup_expired_checks(&self) -> Result<u64> {
        let deleted = self.database.delete_checks_older_than(self.policy.check_retention()).await?;

        info!("Retention cleanup completed: {} checks deleted (older than {} days)", deleted, self.policy.check_days);
        Ok(deleted)
    }

    /// Start background cleanup task. Failures are logged and the next
    /// sweep runs on schedule.
    pub fn start_periodic_cleanup(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = self.cleanup_expired_checks().await {
                            warn!("Periodic retention cleanup failed: {:#}", e);
                        }
                    }
                }
            }

            debug!("Retention cleanup stopped");
        })
    }
}
