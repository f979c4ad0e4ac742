//! The persistence seam used by the ingestion loop.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexerResult;
use crate::events::Transfer;

/// Durable set of decoded transfers, keyed by transaction hash.
///
/// Deduplication is check-then-act: callers insert only after [`exists`]
/// returned `false` within the same cycle. This is sound only while a single
/// ingester writes to the store.
///
/// Implementations propagate storage faults as
/// [`PersistenceError`](crate::error::IndexerError::PersistenceError) and do
/// not retry internally.
///
/// [`exists`]: TransferStore::exists
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Whether a transfer with this transaction hash is already recorded.
    async fn exists(&self, tx_hash: &str) -> IndexerResult<bool>;

    /// Record a transfer. Returns the store-assigned id.
    async fn insert(&self, transfer: &Transfer) -> IndexerResult<i64>;

    /// Number of committed transfers.
    async fn count(&self) -> IndexerResult<u64>;

    /// Last checkpointed block, if any.
    async fn load_checkpoint(&self) -> IndexerResult<Option<u64>>;

    /// Persist `block` as the last fully processed block.
    async fn save_checkpoint(&self, block: u64) -> IndexerResult<()>;
}

#[async_trait]
impl<T: TransferStore + ?Sized> TransferStore for Arc<T> {
    async fn exists(&self, tx_hash: &str) -> IndexerResult<bool> {
        (**self).exists(tx_hash).await
    }

    async fn insert(&self, transfer: &Transfer) -> IndexerResult<i64> {
        (**self).insert(transfer).await
    }

    async fn count(&self) -> IndexerResult<u64> {
        (**self).count().await
    }

    async fn load_checkpoint(&self) -> IndexerResult<Option<u64>> {
        (**self).load_checkpoint().await
    }

    async fn save_checkpoint(&self, block: u64) -> IndexerResult<()> {
        (**self).save_checkpoint(block).await
    }
}
