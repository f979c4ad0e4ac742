//! Database module for persistent storage of decoded transfers.
//!
//! This module provides SQLite-based storage for:
//! - Decoded `Transfer` events (the `transfers` table)
//! - The optional progress checkpoint (the `indexer_checkpoint` table)
//!
//! # Architecture
//!
//! - `models`: Data structures that map to database tables
//! - `store`: The [`TransferStore`] trait the ingestion loop writes through
//! - `repository`: SQLite implementation of [`TransferStore`]
//! - Connection pooling with SQLite WAL mode for concurrency
//! - Migration system for schema versioning

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{IndexerError, IndexerResult};

pub mod models;
pub mod repository;
pub mod store;

pub use repository::Repository;
pub use store::TransferStore;

/// Tables the migrations must have created.
const REQUIRED_TABLES: [&str; 2] = ["transfers", "indexer_checkpoint"];

/// Creates a SQLite connection pool, then applies and verifies migrations.
///
/// # Configuration
///
/// - **WAL mode**: Enables concurrent readers (the health endpoint) during writes
/// - **Busy timeout**: 30 seconds to handle lock contention
/// - **Max connections**: 5, or 1 for `:memory:` databases, which exist per connection
///
/// # Example
///
/// ```no_run
/// use token_transfer_indexer::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./transfers.db").await?;
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// Returns a persistence error if the URL is invalid, the database cannot be
/// opened, or migrations fail.
pub async fn create_pool(database_url: &str) -> IndexerResult<SqlitePool> {
    info!(database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            IndexerError::persistence(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool_options = if is_memory_url(database_url) {
        // Every connection to :memory: opens a fresh database
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5).min_connections(1)
    };

    let pool = pool_options
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            IndexerError::persistence(
                format!("Failed to connect to database at {database_url}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Runs database migrations to ensure schema is up-to-date.
///
/// Applies all pending migrations from the `migrations/` directory in order.
/// Already-applied migrations are skipped, so this is safe to call repeatedly.
///
/// # Errors
///
/// Returns a persistence error if any migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> IndexerResult<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        IndexerError::persistence("Failed to run database migrations", Some(Box::new(e)))
    })?;

    Ok(())
}

/// Verify that required tables exist after migrations.
///
/// # Errors
///
/// Returns a persistence error if the schema query fails or a table is missing.
pub async fn verify_database(pool: &SqlitePool) -> IndexerResult<()> {
    let rows = sqlx::query_as::<_, (String,)>(
        r"
        SELECT name FROM sqlite_master
        WHERE type='table' AND name IN ('transfers', 'indexer_checkpoint')
        ",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        IndexerError::persistence("Failed to verify database schema", Some(Box::new(e)))
    })?;

    if rows.len() < REQUIRED_TABLES.len() {
        let found: Vec<_> = rows.into_iter().map(|(name,)| name).collect();
        return Err(IndexerError::persistence(
            format!(
                "Database schema incomplete. Expected tables {REQUIRED_TABLES:?}, found {found:?}"
            ),
            None,
        ));
    }

    Ok(())
}
