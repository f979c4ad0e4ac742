//! The log source adapter.

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, B256};
use alloy::providers::Provider as _;
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::http::Provider;
use crate::error::{IndexerError, IndexerResult};
use crate::events::{log_filter, RawLogEntry};

/// Read access to chain height and event logs.
///
/// Implementations must return logs in chain order and must not filter or
/// reorder them. Any failure to talk to the node is a
/// [`TransportError`](IndexerError::TransportError).
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current chain head block number.
    async fn block_number(&self) -> IndexerResult<u64>;

    /// Logs emitted by `address` with topic 0 equal to `topic` within the
    /// inclusive range `[from_block, to_block]`.
    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic: B256,
    ) -> IndexerResult<Vec<RawLogEntry>>;
}

#[async_trait]
impl<T: LogSource + ?Sized> LogSource for Arc<T> {
    async fn block_number(&self) -> IndexerResult<u64> {
        (**self).block_number().await
    }

    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic: B256,
    ) -> IndexerResult<Vec<RawLogEntry>> {
        (**self).fetch_logs(from_block, to_block, address, topic).await
    }
}

/// [`LogSource`] backed by an Alloy JSON-RPC provider.
///
/// Only `eth_blockNumber` and `eth_getLogs` are issued. Block headers are never
/// fetched, so chains with non-standard header fields (POA `extraData`) need no
/// special handling.
#[derive(Clone)]
pub struct RpcLogSource {
    provider: Provider,
}

impl RpcLogSource {
    /// Wrap an existing provider.
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Connect to `rpc_url` and wrap the resulting provider.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the URL cannot be parsed.
    pub async fn connect(rpc_url: &str) -> IndexerResult<Self> {
        Ok(Self::new(super::create_provider(rpc_url).await?))
    }

    /// Borrow the underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl LogSource for RpcLogSource {
    async fn block_number(&self) -> IndexerResult<u64> {
        super::get_latest_block(&self.provider).await
    }

    #[instrument(skip(self, address, topic), fields(log_count = tracing::field::Empty))]
    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic: B256,
    ) -> IndexerResult<Vec<RawLogEntry>> {
        let filter = log_filter(address, topic, from_block, to_block);

        let start = Instant::now();
        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            IndexerError::transport(
                format!("eth_getLogs failed for blocks {from_block}..={to_block}"),
                Some(Box::new(e)),
            )
        })?;

        tracing::Span::current().record("log_count", logs.len());
        debug!(
            log_count = logs.len(),
            duration_ms = start.elapsed().as_millis(),
            "Fetched logs"
        );

        Ok(logs.into_iter().map(RawLogEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::TRANSFER_TOPIC;

    #[tokio::test]
    async fn test_unreachable_node_fetch_is_transport_error() {
        let source = RpcLogSource::connect("http://127.0.0.1:9").await.unwrap();

        let err = source
            .fetch_logs(1, 2, Address::ZERO, TRANSFER_TOPIC)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = source.block_number().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        assert!(RpcLogSource::connect("::not a url::").await.is_err());
    }
}
