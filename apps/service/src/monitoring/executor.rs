use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::checker::Checker;
use super::transitions::TransitionTracker;
use crate::database::Database;
use crate::database::models::{CheckRecord, Monitor};
use crate::notifications::{DispatchReport, Notifier};

/// What one pipeline run produced
#[derive(Debug)]
pub struct CheckOutcome {
    pub record: CheckRecord,
    /// Whether this check flipped the monitor's up/down state
    pub changed: bool,
    /// Background delivery of the transition message, when one was sent
    pub notification: Option<JoinHandle<DispatchReport>>,
}

/// Probe, persist, detect, notify, in that order, for one monitor
pub struct CheckPipeline {
    checker: Arc<dyn Checker>,
    database: Arc<dyn Database>,
    transitions: Arc<TransitionTracker>,
    notifier: Notifier,
}

impl CheckPipeline {
    pub fn new(
        checker: Arc<dyn Checker>,
        database: Arc<dyn Database>,
        transitions: Arc<TransitionTracker>,
        notifier: Notifier,
    ) -> Self {
        Self { checker, database, transitions, notifier }
    }

    /// Execute a monitoring check.
    ///
    /// A failed save ends the run before the transition tracker sees the
    /// result, so a state change is only ever announced for a stored check.
    pub async fn run(&self, monitor: &Monitor) -> Result<CheckOutcome> {
        let result = self.checker.check(&monitor.url).await;
        let checked_at = Utc::now();

        let record = self
            .database
            .save_check_atomic(monitor.id, &result, checked_at)
            .await
            .with_context(|| format!("failed to record check for monitor {}", monitor.id))?;

        debug!(
            monitor_id = monitor.id,
            status = record.status_code,
            latency_ms = record.latency_ms,
            up = record.is_up,
            "Check recorded"
        );

        let changed = self.transitions.observe(monitor.id, record.is_up);
        let notification = if changed {
            info!(
                monitor_id = monitor.id,
                "Monitor {} is now {}",
                monitor.name,
                if record.is_up { "up" } else { "down" }
            );
            Some(self.notifier.spawn_notify(monitor.clone(), record.clone()))
        } else {
            None
        };

        Ok(CheckOutcome { record, changed, notification })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierConfig;
    use crate::database::DatabaseImpl;
    use crate::database::models::{NewMonitor, NewWebhook};
    use crate::monitoring::CheckResult;
    use crate::test_support::{CannedServer, ScriptedChecker, create_test_database};

    struct Harness {
        pipeline: CheckPipeline,
        database: Arc<DatabaseImpl>,
        checker: Arc<ScriptedChecker>,
        transitions: Arc<TransitionTracker>,
        monitor: Monitor,
        _dir: tempfile::TempDir,
    }

    async fn harness(results: Vec<CheckResult>) -> Result<Harness> {
        let (pool, dir) = create_test_database().await?;
        let database = Arc::new(DatabaseImpl::new_from_pool(pool));
        let checker = Arc::new(ScriptedChecker::new(results));
        let transitions = Arc::new(TransitionTracker::new());
        let notifier = Notifier::new(database.clone(), &NotifierConfig { timeout_seconds: 2, ..Default::default() })?;

        database
            .create_monitor(&NewMonitor { name: "api".into(), url: "https://api.example.com".into(), interval_seconds: 60 })
            .await?;
        let monitor = database.list_monitors().await?.remove(0);

        let pipeline = CheckPipeline::new(checker.clone(), database.clone(), transitions.clone(), notifier);
        Ok(Harness { pipeline, database, checker, transitions, monitor, _dir: dir })
    }

    #[tokio::test]
    async fn first_check_is_recorded_without_notification() -> Result<()> {
        let h = harness(vec![CheckResult::from_status(200, 40)]).await?;

        let outcome = h.pipeline.run(&h.monitor).await?;
        assert!(outcome.record.is_up);
        assert!(!outcome.changed);
        assert!(outcome.notification.is_none());
        assert_eq!(h.checker.targets(), vec![h.monitor.url.clone()]);
        assert_eq!(h.transitions.last_state(h.monitor.id), Some(true));
        Ok(())
    }

    #[tokio::test]
    async fn state_change_spawns_one_notification() -> Result<()> {
        let h = harness(vec![CheckResult::from_status(200, 40), CheckResult::failed(7)]).await?;
        let webhook = CannedServer::always("204 No Content").await;
        h.database
            .create_webhook(&NewWebhook { name: "ops".into(), url: webhook.url(), enabled: true })
            .await?;

        h.pipeline.run(&h.monitor).await?;
        let outcome = h.pipeline.run(&h.monitor).await?;

        assert!(outcome.changed);
        let report = outcome.notification.expect("notification task").await?;
        assert_eq!(report, DispatchReport { attempted: 1, delivered: 1, failed: 0 });
        assert!(webhook.requests()[0].body.contains("Monitor Down: api"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_save_skips_detection() -> Result<()> {
        let h = harness(vec![CheckResult::from_status(200, 40)]).await?;
        let ghost = Monitor { id: 404, ..h.monitor.clone() };

        assert!(h.pipeline.run(&ghost).await.is_err());
        assert_eq!(h.transitions.last_state(404), None);
        Ok(())
    }
}
