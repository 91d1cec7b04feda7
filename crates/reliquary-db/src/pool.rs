//! Database pool setup
//!
//! The index is a single-file SQLite database living next to the media
//! tree it describes. WAL keeps readers off the single writer's back,
//! which is what the conditional-update claims rely on to serialize
//! competing promotions.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to the asset index and run pending migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, anyhow::Error> {
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .filter(|p| !p.is_empty() && *p != ":memory:")
    {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    tracing::info!(database_url, "Asset index ready");
    Ok(pool)
}
