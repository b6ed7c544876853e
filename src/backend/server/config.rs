/**
 * Database Setup
 *
 * Opens the SQLite pool named by `database_url` and brings the schema up
 * to date with the embedded migrations from `migrations/`. Unlike the rest
 * of the configuration this is async, so it lives with the server rather
 * than in `shared::config`.
 *
 * The database file (and its directory) is created on first start.
 */

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::shared::AppConfig;

/// Schema migrations, embedded at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Open the pool and run pending migrations.
///
/// # Errors
///
/// Returns the sqlx error when the URL is invalid, the file cannot be
/// opened, or a migration fails. Startup should abort in that case.
pub async fn load_database(config: &AppConfig) -> Result<SqlitePool, sqlx::Error> {
    ensure_parent_dir(&config.database_url).await?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    tracing::info!("[Server] connecting to {}", config.database_url);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    tracing::info!("[Server] running database migrations");
    MIGRATOR.run(&pool).await?;
    tracing::info!("[Server] database ready");

    Ok(pool)
}

/// A fresh in-memory database with the schema applied.
///
/// One connection only: every connection to `:memory:` is its own database.
pub async fn memory_database() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

async fn ensure_parent_dir(database_url: &str) -> Result<(), sqlx::Error> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .filter(|rest| !rest.is_empty() && !rest.starts_with(":memory:"));

    if let Some(parent) = path.and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
