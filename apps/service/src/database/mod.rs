/// Database abstraction layer
///
/// Monitors, checks, daily aggregates and webhooks live in one embedded
/// LibSQL file. All access goes through the [`Database`] trait.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
