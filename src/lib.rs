//! # ERC-20 Transfer Indexer
//!
//! Polling indexer for the `Transfer(address,address,uint256)` event of a single
//! token contract, built on [Alloy](https://github.com/alloy-rs/alloy) and SQLite.
//!
//! Every poll cycle asks the node for its head block, fetches the contract's
//! Transfer logs for the blocks not yet covered, decodes them and stores each
//! transfer once (keyed by transaction hash). A small HTTP API reports liveness
//! and Prometheus metrics.
//!
//! ## Features
//!
//! - **Type-safe event decoding** using Alloy's `sol!` macro
//! - **Full 256-bit amounts** stored as decimal text
//! - **Contiguous block coverage** with an optional bounded range per query
//! - **Retry with capped exponential backoff** on transient node failures
//! - **Idempotent storage**: redelivered logs never create duplicate rows
//! - **Graceful shutdown** on SIGINT / SIGTERM
//!
//! ## Architecture
//!
//! 1. **Config** ([`config`]) - environment variable loading
//! 2. **RPC** ([`rpc`]) - provider creation and the [`rpc::LogSource`] seam
//! 3. **Events** ([`events`], [`decoder`]) - raw log shape and Transfer decoding
//! 4. **Storage** ([`db`]) - SQLite pool, migrations and the [`db::TransferStore`] seam
//! 5. **Ingestion** ([`ingester`]) - the poll loop and its progress pointer
//! 6. **API** ([`api`]) - `/healthz`, `/metrics` and OpenAPI docs
//! 7. **Lifecycle** ([`lifecycle`]) - startup ordering and shutdown
//!
//! ## Quick Start
//!
//! ```bash
//! export DATABASE_URL=sqlite:./transfers.db
//! export RPC_URL=https://eth-mainnet.example/v2/KEY
//! export TOKEN_ADDRESS=0xdAC17F958D2ee523a2206206994597C13D831ec7
//!
//! cargo run --release -- serve
//! curl localhost:8000/healthz
//! ```
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use token_transfer_indexer::{
//!     config::Config,
//!     db::{create_pool, Repository},
//!     ingester::{Ingester, IngesterSettings},
//!     rpc::RpcLogSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let repository = Arc::new(Repository::new(create_pool(config.database_url()).await?));
//!     let source = RpcLogSource::connect(config.rpc_url()).await?;
//!
//!     let mut ingester = Ingester::new(source, repository, IngesterSettings::from(&config));
//!     ingester.initialize().await?;
//!     ingester.poll_once().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`error::IndexerResult<T>`](error::IndexerResult).
//! The error kind decides how the loop reacts: transport failures are retried,
//! decode failures skip one log, persistence failures abort the cycle.
//!
//! ```rust
//! use token_transfer_indexer::error::{ErrorKind, IndexerError};
//!
//! let err = IndexerError::transport("node timed out", None);
//! assert_eq!(err.kind(), ErrorKind::Transport);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod db;
pub mod decoder;
pub mod error;
pub mod events;
pub mod ingester;
pub mod lifecycle;
pub mod observability;
pub mod rpc;
