//! ERC-20 `Transfer` event types.
//!
//! The event signature comes from Alloy's `sol!` macro so the topic hash used
//! to filter logs can never drift from the Solidity definition:
//!
//! ```text
//! event Transfer(address indexed from, address indexed to, uint256 value);
//! ```
//!
//! Logs travel through the indexer in two shapes:
//!
//! - [`RawLogEntry`]: what the log source hands back (topics + payload)
//! - [`Transfer`]: what the decoder produces and the store persists
//!
//! ## Example
//!
//! ```no_run
//! use token_transfer_indexer::events::{log_filter, TRANSFER_TOPIC};
//! use alloy::primitives::address;
//!
//! let token = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
//! let filter = log_filter(token, TRANSFER_TOPIC, 19_000_000, 19_000_100);
//! ```

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

sol! {
    interface IERC20 {
        /// Emitted when `value` tokens move from `from` to `to`.
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

/// The generated `Transfer` event binding.
pub use IERC20::Transfer as TransferEvent;

/// Topic 0 of every ERC-20 `Transfer` log.
pub const TRANSFER_TOPIC: B256 = TransferEvent::SIGNATURE_HASH;

/// Create a log filter for one contract and one event topic over an inclusive block range.
#[must_use]
pub fn log_filter(contract: Address, topic: B256, from_block: u64, to_block: u64) -> Filter {
    Filter::new()
        .address(contract)
        .event_signature(topic)
        .from_block(from_block)
        .to_block(to_block)
}

/// Non-indexed payload of a log entry.
///
/// JSON-RPC providers hand back raw bytes; other sources (fixtures, replays)
/// may carry the `0x`-prefixed hex string instead. Both must decode to the
/// same amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// Raw ABI-encoded bytes.
    Bytes(Bytes),
    /// Hex string, with or without a `0x` prefix.
    Hex(String),
}

/// One log entry as returned by a [`LogSource`](crate::rpc::LogSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
    /// Hash of the emitting transaction (absent for pending logs).
    pub tx_hash: Option<B256>,
    /// Block that included the log (absent for pending logs).
    pub block_number: Option<u64>,
    /// Indexed fields; topic 0 is the event signature.
    pub topics: Vec<B256>,
    /// Non-indexed data.
    pub data: LogPayload,
}

impl From<Log> for RawLogEntry {
    fn from(log: Log) -> Self {
        Self {
            tx_hash: log.transaction_hash,
            block_number: log.block_number,
            topics: log.topics().to_vec(),
            data: LogPayload::Bytes(log.data().data.clone()),
        }
    }
}

/// A decoded `Transfer` event ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// `0x`-prefixed transaction hash; the dedup key.
    pub tx_hash: String,
    /// `0x`-prefixed sender address.
    pub from_address: String,
    /// `0x`-prefixed recipient address.
    pub to_address: String,
    /// Token amount in base units.
    pub value: U256,
    /// Block that included the transfer.
    pub block_number: u64,
    /// When the indexer decoded the log (processing time, not block time).
    pub observed_at: DateTime<Utc>,
}
