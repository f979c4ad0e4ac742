//! HTTP JSON-RPC provider construction.
//!
//! This module handles connection to the chain node over HTTP.
//! It uses Alloy's `ProviderBuilder` without wallet fillers; the indexer only
//! reads (`eth_blockNumber`, `eth_getLogs`).
//!
//! ## Example
//!
//! ```no_run
//! use token_transfer_indexer::rpc::{create_provider, get_latest_block};
//! use token_transfer_indexer::error::IndexerResult;
//!
//! # async fn example() -> IndexerResult<()> {
//! let provider = create_provider("http://localhost:8545").await?;
//! let latest_block = get_latest_block(&provider).await?;
//! println!("Latest block: {}", latest_block);
//! # Ok(())
//! # }
//! ```

use crate::error::{IndexerError, IndexerResult};
use alloy::providers::{Provider as _, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info, instrument, warn};

/// Type alias for the read-only HTTP provider.
pub type Provider = RootProvider<Http<Client>>;

/// Create a new chain RPC provider connected via HTTP.
///
/// No request is sent here; an unreachable node surfaces on the first call
/// (see [`check_connection`]).
///
/// # Errors
///
/// Returns an error if the RPC URL cannot be parsed.
#[allow(clippy::unused_async)]
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub async fn create_provider(rpc_url: &str) -> IndexerResult<Provider> {
    info!("Initializing RPC provider");

    // Hosted endpoints embed API keys in the path; log only scheme + host
    let host = rpc_url
        .split('/')
        .take(3)
        .collect::<Vec<_>>()
        .join("/");
    tracing::Span::current().record("rpc_host", host.as_str());
    debug!(rpc_host = %host, "Creating HTTP provider");

    let url = rpc_url.parse().map_err(|e| {
        IndexerError::transport(
            format!("Failed to parse RPC URL for host '{host}'"),
            Some(Box::new(e)),
        )
    })?;

    let provider = ProviderBuilder::new().on_http(url);

    info!("RPC provider initialized successfully");

    Ok(provider)
}

/// Get the latest block number from the chain.
///
/// # Errors
///
/// Returns a transport error if the RPC request fails or the response cannot
/// be parsed.
#[instrument(skip(provider), fields(block = tracing::field::Empty, duration_ms = tracing::field::Empty))]
pub async fn get_latest_block(provider: &Provider) -> IndexerResult<u64> {
    debug!("Fetching latest block number");

    let start = std::time::Instant::now();
    let block_number = provider.get_block_number().await.map_err(|e| {
        IndexerError::transport("Failed to fetch latest block number", Some(Box::new(e)))
    })?;

    let duration = start.elapsed();
    tracing::Span::current().record("block", block_number);
    tracing::Span::current().record("duration_ms", duration.as_millis() as u64);

    debug!(
        block = block_number,
        duration_ms = duration.as_millis(),
        "Latest block fetched"
    );

    Ok(block_number)
}

/// Check if the provider connection is healthy by fetching the latest block.
///
/// Used at startup so an unreachable node fails the process instead of the
/// first poll cycle.
///
/// # Errors
///
/// Returns an error if the RPC connection is not working.
#[instrument(skip(provider))]
pub async fn check_connection(provider: &Provider) -> IndexerResult<u64> {
    debug!("Checking provider connection health");

    match get_latest_block(provider).await {
        Ok(block) => {
            info!(block = block, "Connection check successful");
            Ok(block)
        }
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            Err(IndexerError::transport(
                "Provider connection health check failed",
                Some(Box::new(e)),
            ))
        }
    }
}
