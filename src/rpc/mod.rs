//! RPC access to the chain node.
//!
//! # Layers
//!
//! - [`http`]: Alloy HTTP provider construction and head lookups
//! - [`log_source`]: the [`LogSource`] seam the ingestion loop polls through
//!
//! The ingestion loop never talks to Alloy directly. It only needs
//! `eth_blockNumber` and `eth_getLogs`, both behind [`LogSource`], so tests can
//! script chain behavior without a node.
//!
//! ```rust,no_run
//! use token_transfer_indexer::rpc::{create_provider, LogSource, RpcLogSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = create_provider("http://localhost:8545").await?;
//! let source = RpcLogSource::new(provider);
//! let head = source.block_number().await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod log_source;

pub use http::{check_connection, create_provider, get_latest_block, Provider};
pub use log_source::{LogSource, RpcLogSource};
