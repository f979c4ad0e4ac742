//! Prometheus-compatible metrics collection.
//!
//! One [`Metrics`] registry per process, shared between the ingestion loop
//! (through a cloned [`IngestMetrics`]) and the HTTP layer. Metric handles are
//! reference counted, so clones update the same series.

use std::sync::atomic::AtomicU64;
use std::time::Instant;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::error::ErrorKind;

/// Labels for failed ingestion cycles.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FailureLabels {
    /// Error classification (`transport`, `persistence`, ...)
    pub kind: String,
}

/// Labels for served HTTP requests.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    /// Request method
    pub method: String,
    /// Matched route, or the raw path when no route matched
    pub path: String,
    /// Response status code
    pub status: String,
}

/// Ingestion loop telemetry.
#[derive(Debug, Clone, Default)]
pub struct IngestMetrics {
    /// Completed poll cycles, including ones with nothing to fetch.
    pub cycles: Counter,
    /// Failed poll cycles by error kind.
    pub cycle_failures: Family<FailureLabels, Counter>,
    /// Log entries skipped because they could not be decoded.
    pub decode_failures: Counter,
    /// Transfers written to the store.
    pub transfers_inserted: Counter,
    /// Transfers skipped because their tx hash was already stored.
    pub duplicates_skipped: Counter,
    /// Progress pointer.
    pub last_processed_block: Gauge,
    /// Most recently observed chain head.
    pub chain_head_block: Gauge,
}

impl IngestMetrics {
    /// Record a failed cycle.
    pub fn record_failure(&self, kind: ErrorKind) {
        self.cycle_failures
            .get_or_create(&FailureLabels {
                kind: kind.as_str().to_string(),
            })
            .inc();
    }

    /// Update the progress pointer gauge.
    pub fn set_pointer(&self, block: u64) {
        self.last_processed_block.set(clamp_i64(block));
    }

    /// Update the chain head gauge.
    pub fn set_head(&self, block: u64) {
        self.chain_head_block.set(clamp_i64(block));
    }

    fn register(&self, registry: &mut Registry) {
        registry.register(
            "indexer_cycles",
            "Completed ingestion poll cycles",
            self.cycles.clone(),
        );
        registry.register(
            "indexer_cycle_failures",
            "Failed ingestion poll cycles by error kind",
            self.cycle_failures.clone(),
        );
        registry.register(
            "indexer_decode_failures",
            "Log entries skipped because they failed to decode",
            self.decode_failures.clone(),
        );
        registry.register(
            "indexer_transfers_inserted",
            "Transfers inserted into the store",
            self.transfers_inserted.clone(),
        );
        registry.register(
            "indexer_duplicates_skipped",
            "Transfers skipped because the transaction hash was already stored",
            self.duplicates_skipped.clone(),
        );
        registry.register(
            "indexer_last_processed_block",
            "Last block fully processed by the ingestion loop",
            self.last_processed_block.clone(),
        );
        registry.register(
            "indexer_chain_head_block",
            "Most recently observed chain head",
            self.chain_head_block.clone(),
        );
    }
}

/// HTTP request telemetry.
#[derive(Debug, Clone)]
pub struct HttpMetrics {
    /// Served requests by method, route and status.
    pub requests: Family<HttpLabels, Counter>,
    /// Request latency in seconds.
    pub duration_seconds: Histogram,
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self {
            requests: Family::default(),
            // 1ms to ~16s
            duration_seconds: Histogram::new(exponential_buckets(0.001, 2.0, 15)),
        }
    }
}

impl HttpMetrics {
    /// Record one served request.
    pub fn observe(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.requests
            .get_or_create(&HttpLabels {
                method: method.to_string(),
                path: path.to_string(),
                status: status.to_string(),
            })
            .inc();
        self.duration_seconds.observe(duration_secs);
    }

    fn register(&self, registry: &mut Registry) {
        registry.register(
            "http_requests",
            "HTTP requests served",
            self.requests.clone(),
        );
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            self.duration_seconds.clone(),
        );
    }
}

/// Central metrics registry for the indexer.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    /// Ingestion loop metrics.
    pub ingest: IngestMetrics,
    /// HTTP layer metrics.
    pub http: HttpMetrics,
    uptime_seconds: Gauge<f64, AtomicU64>,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new registry with all metrics registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let ingest = IngestMetrics::default();
        let http = HttpMetrics::default();
        let uptime_seconds = Gauge::<f64, AtomicU64>::default();

        ingest.register(&mut registry);
        http.register(&mut registry);
        registry.register(
            "process_uptime_seconds",
            "Seconds since the process started",
            uptime_seconds.clone(),
        );

        Self {
            registry,
            ingest,
            http,
            uptime_seconds,
            started_at: Instant::now(),
        }
    }

    /// Encode all metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        self.uptime_seconds
            .set(self.started_at.elapsed().as_secs_f64());

        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

fn clamp_i64(block: u64) -> i64 {
    i64::try_from(block).unwrap_or(i64::MAX)
}
