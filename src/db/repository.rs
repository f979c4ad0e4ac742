//! Repository pattern for database operations.
//!
//! Provides the SQLite-backed [`TransferStore`]: dedup lookups, inserts,
//! counts and the optional progress checkpoint.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{Checkpoint, TransferRecord};
use super::store::TransferStore;
use crate::error::{IndexerError, IndexerResult};
use crate::events::Transfer;

/// Repository for database operations.
///
/// Wraps a SQLite connection pool. Cloning is cheap and shares the pool, so the
/// ingestion loop and the HTTP layer can hold their own handles.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Creates a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Borrow the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== TRANSFER OPERATIONS ====================

    /// Fetch the first stored transfer with this transaction hash.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub async fn find_by_tx_hash(&self, tx_hash: &str) -> IndexerResult<Option<TransferRecord>> {
        sqlx::query_as::<_, TransferRecord>(
            "SELECT * FROM transfers WHERE tx_hash = ? ORDER BY id LIMIT 1",
        )
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::persistence("Failed to query transfer by tx hash", Some(Box::new(e)))
        })
    }

    /// Most recently inserted transfers, newest first.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub async fn recent_transfers(&self, limit: u32) -> IndexerResult<Vec<TransferRecord>> {
        sqlx::query_as::<_, TransferRecord>("SELECT * FROM transfers ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::persistence("Failed to query recent transfers", Some(Box::new(e)))
            })
    }

    // ==================== API QUERY OPERATIONS ====================

    /// Health check for database connectivity.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the database cannot be reached.
    pub async fn health_check(&self) -> IndexerResult<()> {
        sqlx::query("SELECT 1 AS ok")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::persistence("Database health check failed", Some(Box::new(e)))
            })?;

        Ok(())
    }

    // ==================== CHECKPOINT OPERATIONS ====================

    /// Full checkpoint row, including when it was written.
    ///
    /// Returns `None` if no checkpoint exists (first run, or checkpoints disabled).
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the query fails.
    pub async fn get_checkpoint(&self) -> IndexerResult<Option<Checkpoint>> {
        sqlx::query_as::<_, Checkpoint>(
            "SELECT last_processed_block, updated_at FROM indexer_checkpoint WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::persistence("Failed to query checkpoint", Some(Box::new(e))))
    }
}

#[async_trait]
impl TransferStore for Repository {
    #[instrument(skip(self))]
    async fn exists(&self, tx_hash: &str) -> IndexerResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM transfers WHERE tx_hash = ? LIMIT 1")
            .bind(tx_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::persistence("Failed to query existing transfer", Some(Box::new(e)))
            })?;

        Ok(found.is_some())
    }

    #[instrument(skip(self, transfer), fields(tx_hash = %transfer.tx_hash, block = transfer.block_number))]
    async fn insert(&self, transfer: &Transfer) -> IndexerResult<i64> {
        let record = TransferRecord::from_transfer(transfer)?;

        let result = sqlx::query(
            r"
            INSERT INTO transfers (
                tx_hash, from_address, to_address, value, block_number, observed_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.tx_hash)
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(&record.value)
        .bind(record.block_number)
        .bind(record.observed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::persistence("Failed to insert transfer", Some(Box::new(e))))?;

        let id = result.last_insert_rowid();
        debug!(id, "Inserted transfer");

        Ok(id)
    }

    async fn count(&self) -> IndexerResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transfers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::persistence("Failed to count transfers", Some(Box::new(e)))
            })?;

        u64::try_from(count).map_err(|e| {
            IndexerError::persistence(format!("Negative transfer count {count}"), Some(Box::new(e)))
        })
    }

    async fn load_checkpoint(&self) -> IndexerResult<Option<u64>> {
        self.get_checkpoint()
            .await?
            .map(|c| {
                u64::try_from(c.last_processed_block).map_err(|e| {
                    IndexerError::persistence(
                        format!("Corrupt checkpoint block {}", c.last_processed_block),
                        Some(Box::new(e)),
                    )
                })
            })
            .transpose()
    }

    #[instrument(skip(self))]
    async fn save_checkpoint(&self, block: u64) -> IndexerResult<()> {
        let block = i64::try_from(block).map_err(|e| {
            IndexerError::persistence(
                format!("Checkpoint block {block} exceeds i64 range"),
                Some(Box::new(e)),
            )
        })?;

        sqlx::query(
            r"
            INSERT INTO indexer_checkpoint (id, last_processed_block, updated_at)
            VALUES (1, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                last_processed_block = excluded.last_processed_block,
                updated_at = excluded.updated_at
            ",
        )
        .bind(block)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::persistence("Failed to save checkpoint", Some(Box::new(e))))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use alloy::primitives::U256;

    async fn setup_test_db() -> Repository {
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        Repository::new(pool)
    }

    fn transfer(tx_hash: &str, value: U256, block_number: u64) -> Transfer {
        Transfer {
            tx_hash: tx_hash.to_string(),
            from_address: "0xb518b3136e491101f22b77f385fe22269c515188".to_string(),
            to_address: "0x7dfd6013cf8d92b751e63d481b51fe0e4c5abf5e".to_string(),
            value,
            block_number,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let repo = setup_test_db().await;

        assert!(!repo.exists("0xabc").await.unwrap());
        let id = repo
            .insert(&transfer("0xabc", U256::from(100u64), 100))
            .await
            .expect("Failed to insert transfer");

        assert!(id > 0);
        assert!(repo.exists("0xabc").await.unwrap());
        assert!(!repo.exists("0xdef").await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stored_fields_round_trip() {
        let repo = setup_test_db().await;
        let t = transfer("0xabc", U256::from(100u64), 100);
        repo.insert(&t).await.unwrap();

        let record = repo.find_by_tx_hash("0xabc").await.unwrap().unwrap();
        assert_eq!(record.from_address, t.from_address);
        assert_eq!(record.to_address, t.to_address);
        assert_eq!(record.value, "100");
        assert_eq!(record.block_number, 100);
        assert_eq!(record.observed_at, t.observed_at);
    }

    #[tokio::test]
    async fn test_large_value_stored_as_exact_decimal() {
        let repo = setup_test_db().await;
        let big = U256::from(u128::MAX) * U256::from(1_000u64) + U256::from(7u64);
        repo.insert(&transfer("0xbig", big, 5)).await.unwrap();

        let record = repo.find_by_tx_hash("0xbig").await.unwrap().unwrap();
        assert_eq!(record.value, "340282366920938463463374607431768211455007");
        assert_eq!(record.value_u256().unwrap(), big);
    }

    #[tokio::test]
    async fn test_store_does_not_enforce_uniqueness() {
        // Dedup is the caller's job; the store accepts a second row
        let repo = setup_test_db().await;
        repo.insert(&transfer("0xabc", U256::from(1u64), 1)).await.unwrap();
        repo.insert(&transfer("0xabc", U256::from(1u64), 1)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recent_transfers_newest_first() {
        let repo = setup_test_db().await;
        for (i, hash) in ["0x01", "0x02", "0x03"].iter().enumerate() {
            repo.insert(&transfer(hash, U256::from(1u64), i as u64)).await.unwrap();
        }

        let recent = repo.recent_transfers(2).await.unwrap();
        let hashes: Vec<_> = recent.iter().map(|r| r.tx_hash.as_str()).collect();
        assert_eq!(hashes, ["0x03", "0x02"]);
    }

    #[tokio::test]
    async fn test_checkpoint_upsert() {
        let repo = setup_test_db().await;

        assert_eq!(repo.load_checkpoint().await.unwrap(), None);

        repo.save_checkpoint(99).await.unwrap();
        assert_eq!(repo.load_checkpoint().await.unwrap(), Some(99));

        repo.save_checkpoint(150).await.unwrap();
        assert_eq!(repo.load_checkpoint().await.unwrap(), Some(150));

        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM indexer_checkpoint")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(rows.0, 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = setup_test_db().await;
        assert!(repo.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_is_persistence_error() {
        let repo = setup_test_db().await;
        repo.pool().close().await;

        let err = repo.count().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Persistence);
        assert_eq!(err.to_string(), "Persistence error: Failed to count transfers");
        assert!(std::error::Error::source(&err).is_some());
        assert!(repo.health_check().await.is_err());
    }
}
