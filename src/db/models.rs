//! Database models that map to SQL tables.
//!
//! These structures represent rows in the database and provide
//! conversions from decoded events to database representations.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, IndexerResult};
use crate::events::Transfer;

/// A persisted `Transfer` event.
///
/// Maps to the `transfers` table. `value` is the exact decimal rendering of
/// the on-chain `uint256`, since amounts routinely exceed SQLite's 64-bit
/// integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRecord {
    /// Database-assigned unique identifier
    pub id: i64,
    /// Transaction hash (hex string with 0x prefix)
    pub tx_hash: String,
    /// Sender address (hex string with 0x prefix)
    pub from_address: String,
    /// Recipient address (hex string with 0x prefix)
    pub to_address: String,
    /// Amount in token base units, as a decimal string
    pub value: String,
    /// Block that included the transfer
    pub block_number: i64,
    /// When the indexer decoded the event
    pub observed_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Creates a new record from a decoded transfer.
    ///
    /// `id` is left at 0; the database assigns it on insert.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the block number does not fit in SQLite's
    /// signed 64-bit integer.
    pub fn from_transfer(transfer: &Transfer) -> IndexerResult<Self> {
        let block_number = i64::try_from(transfer.block_number).map_err(|e| {
            IndexerError::persistence(
                format!("Block number {} exceeds i64 range", transfer.block_number),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            id: 0,
            tx_hash: transfer.tx_hash.clone(),
            from_address: transfer.from_address.clone(),
            to_address: transfer.to_address.clone(),
            value: transfer.value.to_string(),
            block_number,
            observed_at: transfer.observed_at,
        })
    }

    /// Parses the stored decimal amount back into a `U256`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the column does not hold a valid decimal.
    pub fn value_u256(&self) -> IndexerResult<U256> {
        U256::from_str_radix(&self.value, 10).map_err(|e| {
            IndexerError::persistence(
                format!("Stored value '{}' is not a decimal uint256", self.value),
                Some(Box::new(e)),
            )
        })
    }
}

/// Persisted progress of the ingestion loop.
///
/// Maps to the single-row `indexer_checkpoint` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Checkpoint {
    /// Last block fully processed
    pub last_processed_block: i64,
    /// When the checkpoint was written
    pub updated_at: DateTime<Utc>,
}
