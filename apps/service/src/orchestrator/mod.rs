/// Orchestrator module - coordinates all components
///
/// The orchestrator is the core coordinator that:
/// - Manages the lifecycle of all components
/// - Wires the checker, store, transition tracker and notifier into one pipeline
/// - Runs the scheduler and retention loops until shutdown
pub mod retention;


pub use retention::{RetentionCleanup, RetentionPolicy};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::monitoring::{CheckPipeline, Checker, HttpChecker, MonitoringScheduler, TargetGuard, TransitionTracker};
use crate::notifications::Notifier;
use crate::pool::LibsqlPool;

/// Time given to background tasks to wind down after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on the retention window, keeps day arithmetic in range
const MAX_RETENTION_DAYS: u64 = 36_500;

/// Main orchestrator for the sentinel service
pub struct Orchestrator {
    database: Arc<dyn Database>,
    scheduler: Arc<MonitoringScheduler>,
    retention: Arc<RetentionCleanup>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Create and start a new orchestrator
    /// This is a convenience method that creates and immediately runs the orchestrator
    pub async fn start(config: Config, pool: LibsqlPool) -> Result<()> {
        let orchestrator = Self::new(config, pool).await?;
        orchestrator.run().await
    }

    /// Create a new orchestrator instance
    async fn new(config: Config, pool: LibsqlPool) -> Result<Self> {
        let checker =
            HttpChecker::new(config.prober.timeout(), TargetGuard::new(config.prober.allow_private_targets))?;
        if config.prober.allow_private_targets {
            warn!("Private target guard is disabled, checks may reach internal addresses");
        }

        Self::with_checker(config, pool, Arc::new(checker)).await
    }

    /// Build the orchestrator around an arbitrary checker
    async fn with_checker(config: Config, pool: LibsqlPool, checker: Arc<dyn Checker>) -> Result<Self> {
        // Get database connection for initialization
        let conn = pool.get().await?;

        // Initialize database schema
        info!("Initializing database schema...");
        initialize_database(&conn).await?;
        drop(conn);

        let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));

        let notifier = Notifier::new(database.clone(), &config.notifier)?;
        let pipeline = Arc::new(CheckPipeline::new(
            checker,
            database.clone(),
            Arc::new(TransitionTracker::new()),
            notifier,
        ));

        let scheduler = Arc::new(MonitoringScheduler::new(
            database.clone(),
            pipeline,
            config.scheduler.tick_interval(),
            config.scheduler.max_concurrent_checks,
        ));

        let policy = RetentionPolicy { check_days: config.scheduler.retention_days.min(MAX_RETENTION_DAYS) as i64 };
        let retention =
            Arc::new(RetentionCleanup::new(database.clone(), policy, config.scheduler.retention_interval()));

        Ok(Self { database, scheduler, retention, shutdown: CancellationToken::new() })
    }

    /// Spawn the scheduler and retention loops
    fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.scheduler.clone().run(self.shutdown.child_token())),
            self.retention.clone().start_periodic_cleanup(self.shutdown.child_token()),
        ]
    }

    /// Run the orchestrator until the process is asked to stop
    async fn run(self) -> Result<()> {
        let monitors = self.database.list_monitors().await?;
        info!("Starting sentinel orchestrator with {} monitors", monitors.len());

        let handles = self.spawn_background();

        wait_for_shutdown_signal().await?;
        info!("Shutdown requested, stopping scheduler");
        self.shutdown.cancel();

        // In-flight checks are abandoned if they do not finish in time
        if tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(handles)).await.is_err() {
            warn!("Background tasks did not stop within {}s", SHUTDOWN_GRACE.as_secs());
        }

        info!("Orchestrator stopped");
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
