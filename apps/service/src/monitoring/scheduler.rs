use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::CheckPipeline;
use crate::database::Database;

/// Monitoring scheduler - decides which monitors are due and launches their checks
pub struct MonitoringScheduler {
    database: Arc<dyn Database>,
    pipeline: Arc<CheckPipeline>,
    tick_interval: Duration,
    /// Caps in-flight checks across ticks when set
    permits: Option<Arc<Semaphore>>,
}

impl MonitoringScheduler {
    pub fn new(
        database: Arc<dyn Database>,
        pipeline: Arc<CheckPipeline>,
        tick_interval: Duration,
        max_concurrent_checks: Option<usize>,
    ) -> Self {
        Self {
            database,
            pipeline,
            tick_interval,
            permits: max_concurrent_checks.map(|max| Arc::new(Semaphore::new(max.max(1)))),
        }
    }

    /// Run one scheduling pass at `now`.
    ///
    /// Each due monitor is stamped as checked before its check is launched,
    /// so a slow check cannot be picked up again by the next tick. The
    /// returned handles are only for callers that want to wait; the loop
    /// drops them.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<()>>> {
        let monitors = self.database.list_monitors().await?;
        let mut launched = Vec::new();

        for monitor in monitors.into_iter().filter(|m| m.is_due(now)) {
            if let Err(e) = self.database.mark_checked(monitor.id, now).await {
                warn!(monitor_id = monitor.id, "Failed to mark monitor as checked, skipping: {}", e);
                continue;
            }

            let pipeline = self.pipeline.clone();
            let permits = self.permits.clone();
            launched.push(tokio::spawn(async move {
                let _permit = match permits {
                    Some(permits) => match permits.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return,
                    },
                    None => None,
                };

                if let Err(e) = pipeline.run(&monitor).await {
                    error!(monitor_id = monitor.id, "Check pipeline failed: {:#}", e);
                }
            }));
        }

        if !launched.is_empty() {
            debug!("Launched {} checks", launched.len());
        }
        Ok(launched)
    }

    pub async fn tick(&self) -> Result<Vec<JoinHandle<()>>> {
        self.tick_at(Utc::now()).await
    }

    /// Tick until `shutdown` is cancelled. The first tick fires immediately.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut timer = interval(self.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scheduler started (tick every {}s)", self.tick_interval.as_secs());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Failed to list monitors, skipping tick: {:#}", e);
                    }
                }
            }
        }

        if let Some(permits) = &self.permits {
            permits.close();
        }
        info!("Scheduler stopped");
    }
}
