//! The ingestion loop.
//!
//! [`Ingester`] is an explicit state machine:
//!
//! ```text
//! INITIALIZING ──▶ POLLING ⇄ IDLE ──▶ STOPPING ──▶ STOPPED
//! ```
//!
//! Each POLLING cycle reads the chain head, fetches `Transfer` logs for
//! `[pointer + 1, head]`, decodes them in order and inserts the ones whose
//! transaction hash is not yet stored. The progress pointer moves to the
//! cycle's `to_block` only once every entry has been handled.
//!
//! Failures are contained per cycle:
//!
//! | Error kind   | Effect                                            |
//! |--------------|---------------------------------------------------|
//! | transport    | cycle abandoned, pointer held, range retried      |
//! | decode       | entry skipped, cycle continues                    |
//! | persistence  | cycle abandoned, pointer held, range retried      |
//!
//! Stop requests arrive on a `tokio::sync::watch` channel and are honoured at
//! the start of a cycle and during the idle sleep. A cycle in flight always
//! runs to completion.

pub mod backoff;

use std::fmt;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::db::TransferStore;
use crate::decoder;
use crate::error::{ErrorKind, IndexerResult};
use crate::events::TRANSFER_TOPIC;
use crate::observability::metrics::IngestMetrics;
use crate::rpc::LogSource;

pub use backoff::Backoff;

const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Lifecycle state of an [`Ingester`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngesterState {
    /// Deriving the starting pointer from the chain head.
    Initializing,
    /// Running a cycle.
    Polling,
    /// Sleeping between cycles.
    Idle,
    /// Stop observed; leaving the loop.
    Stopping,
    /// Loop exited.
    Stopped,
}

impl fmt::Display for IngesterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "INITIALIZING",
            Self::Polling => "POLLING",
            Self::Idle => "IDLE",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// What the loop needs from the process configuration.
#[derive(Debug, Clone)]
pub struct IngesterSettings {
    /// Token contract whose `Transfer` logs are ingested.
    pub token_address: Address,
    /// Idle time between cycles.
    pub poll_interval: Duration,
    /// Largest block span fetched per cycle; `None` fetches up to the head.
    pub max_block_range: Option<u64>,
    /// Ceiling on the idle delay after repeated failures.
    pub max_backoff: Duration,
    /// Start from the stored checkpoint and keep it updated.
    pub resume_from_checkpoint: bool,
}

impl IngesterSettings {
    /// Settings with an unbounded range, default backoff cap and no checkpoint.
    #[must_use]
    pub const fn new(token_address: Address, poll_interval: Duration) -> Self {
        Self {
            token_address,
            poll_interval,
            max_block_range: None,
            max_backoff: DEFAULT_MAX_BACKOFF,
            resume_from_checkpoint: false,
        }
    }
}

impl From<&Config> for IngesterSettings {
    fn from(config: &Config) -> Self {
        Self {
            token_address: config.token_address(),
            poll_interval: config.poll_interval(),
            max_block_range: config.max_block_range(),
            max_backoff: config.max_backoff(),
            resume_from_checkpoint: config.resume_from_checkpoint(),
        }
    }
}

/// Counts from one cycle that fetched a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// First block of the range.
    pub from_block: u64,
    /// Last block of the range; the new pointer.
    pub to_block: u64,
    /// Log entries returned by the source.
    pub fetched: usize,
    /// Transfers written.
    pub inserted: usize,
    /// Entries whose tx hash was already stored.
    pub duplicates: usize,
    /// Entries skipped as undecodable.
    pub decode_failures: usize,
}

/// Result of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Head has not moved past the pointer; nothing fetched.
    UpToDate {
        /// Observed chain head.
        head: u64,
    },
    /// A range was fetched and processed.
    Processed(CycleReport),
}

/// Compute the next inclusive range to fetch, if any.
///
/// Returns `None` when `pointer + 1 > head`. With `max_range = Some(n)` the
/// range is at most `n` blocks wide.
#[must_use]
pub fn next_range(pointer: u64, head: u64, max_range: Option<u64>) -> Option<(u64, u64)> {
    let from_block = pointer.checked_add(1)?;
    if from_block > head {
        return None;
    }
    let to_block = match max_range {
        Some(n) => head.min(from_block.saturating_add(n.max(1) - 1)),
        None => head,
    };
    Some((from_block, to_block))
}

/// Polls a [`LogSource`] and writes decoded transfers to a [`TransferStore`].
pub struct Ingester<L, S> {
    source: L,
    store: S,
    settings: IngesterSettings,
    metrics: IngestMetrics,
    state: IngesterState,
    pointer: Option<u64>,
    backoff: Backoff,
}

impl<L, S> fmt::Debug for Ingester<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingester")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("pointer", &self.pointer)
            .field("failures", &self.backoff.failures())
            .finish_non_exhaustive()
    }
}

impl<L: LogSource, S: TransferStore> Ingester<L, S> {
    /// Create an ingester in the INITIALIZING state.
    pub fn new(source: L, store: S, settings: IngesterSettings) -> Self {
        let backoff = Backoff::new(settings.poll_interval, settings.max_backoff);
        Self {
            source,
            store,
            settings,
            metrics: IngestMetrics::default(),
            state: IngesterState::Initializing,
            pointer: None,
            backoff,
        }
    }

    /// Report into a shared metrics registry.
    #[must_use]
    pub fn with_metrics(mut self, metrics: IngestMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current state.
    pub const fn state(&self) -> IngesterState {
        self.state
    }

    /// Last fully processed block, once initialized.
    pub const fn pointer(&self) -> Option<u64> {
        self.pointer
    }

    /// Consecutive failed cycles.
    pub const fn consecutive_failures(&self) -> u32 {
        self.backoff.failures()
    }

    /// Derive the starting pointer and move to POLLING.
    ///
    /// The pointer starts one block behind the head, so the first cycle covers
    /// the head block. With checkpoints enabled a stored checkpoint `c` wins,
    /// clamped to the head.
    ///
    /// # Errors
    ///
    /// Returns the source or store error; startup cannot proceed without a head.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> IndexerResult<u64> {
        self.state = IngesterState::Initializing;

        let head = self.source.block_number().await?;
        self.metrics.set_head(head);

        let checkpoint = if self.settings.resume_from_checkpoint {
            self.store.load_checkpoint().await?
        } else {
            None
        };

        let pointer = match checkpoint {
            Some(c) => {
                info!(checkpoint = c, head, "Resuming from stored checkpoint");
                c.min(head)
            }
            None => head.saturating_sub(1),
        };

        self.pointer = Some(pointer);
        self.metrics.set_pointer(pointer);
        self.state = IngesterState::Polling;

        info!(head, pointer, token = %self.settings.token_address, "Ingester initialized");
        Ok(pointer)
    }

    /// Run one POLLING cycle and update the failure streak.
    ///
    /// Initializes first if needed.
    ///
    /// # Errors
    ///
    /// Returns the transport or persistence error that aborted the cycle. The
    /// pointer is unchanged in that case.
    pub async fn poll_once(&mut self) -> IndexerResult<CycleOutcome> {
        self.state = IngesterState::Polling;

        match self.cycle().await {
            Ok(outcome) => {
                self.backoff.reset();
                self.metrics.cycles.inc();
                Ok(outcome)
            }
            Err(e) => {
                self.backoff.record_failure();
                self.metrics.record_failure(e.kind());
                Err(e)
            }
        }
    }

    async fn cycle(&mut self) -> IndexerResult<CycleOutcome> {
        let pointer = match self.pointer {
            Some(p) => p,
            None => self.initialize().await?,
        };

        let head = self.source.block_number().await?;
        self.metrics.set_head(head);

        let Some((from_block, to_block)) =
            next_range(pointer, head, self.settings.max_block_range)
        else {
            debug!(head, pointer, "No new blocks");
            return Ok(CycleOutcome::UpToDate { head });
        };

        let report = self.process_range(from_block, to_block).await?;

        if self.settings.resume_from_checkpoint {
            self.store.save_checkpoint(to_block).await?;
        }
        self.pointer = Some(to_block);
        self.metrics.set_pointer(to_block);

        if report.inserted > 0 || report.decode_failures > 0 {
            info!(
                from_block,
                to_block,
                inserted = report.inserted,
                duplicates = report.duplicates,
                decode_failures = report.decode_failures,
                "Processed block range"
            );
        } else {
            debug!(from_block, to_block, fetched = report.fetched, "Processed block range");
        }

        Ok(CycleOutcome::Processed(report))
    }

    #[instrument(skip(self))]
    async fn process_range(&self, from_block: u64, to_block: u64) -> IndexerResult<CycleReport> {
        let entries = self
            .source
            .fetch_logs(
                from_block,
                to_block,
                self.settings.token_address,
                TRANSFER_TOPIC,
            )
            .await?;

        let mut report = CycleReport {
            from_block,
            to_block,
            fetched: entries.len(),
            ..CycleReport::default()
        };

        for entry in &entries {
            let transfer = match decoder::decode(entry) {
                Ok(transfer) => transfer,
                Err(e) => {
                    warn!(error = %e, tx_hash = ?entry.tx_hash, block = ?entry.block_number, "Skipping undecodable log");
                    report.decode_failures += 1;
                    self.metrics.decode_failures.inc();
                    continue;
                }
            };

            if self.store.exists(&transfer.tx_hash).await? {
                debug!(tx_hash = %transfer.tx_hash, "Transfer already stored");
                report.duplicates += 1;
                self.metrics.duplicates_skipped.inc();
                continue;
            }

            self.store.insert(&transfer).await?;
            report.inserted += 1;
            self.metrics.transfers_inserted.inc();
        }

        Ok(report)
    }

    /// Drive cycles until `shutdown` carries `true` or its sender is dropped.
    ///
    /// Cycle errors are logged and contained; the only error returned is a
    /// failed initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the ingester was not initialized and
    /// [`initialize`](Self::initialize) fails.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> IndexerResult<()> {
        if self.pointer.is_none() {
            self.initialize().await?;
        }

        info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "Ingestion loop started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            match self.poll_once().await {
                Ok(_) => {}
                Err(e) => match e.kind() {
                    ErrorKind::Persistence => {
                        error!(error = %e, pointer = ?self.pointer, "Cycle aborted by persistence failure");
                    }
                    _ => {
                        warn!(error = %e, pointer = ?self.pointer, "Cycle failed, retrying same range");
                    }
                },
            }

            self.state = IngesterState::Idle;
            let delay = self.backoff.next_delay();
            if self.backoff.failures() > 1 {
                debug!(delay_ms = delay.as_millis(), failures = self.backoff.failures(), "Backing off");
            }

            if stop_requested_during(delay, &mut shutdown).await {
                break;
            }
        }

        self.state = IngesterState::Stopping;
        info!(pointer = ?self.pointer, "Ingestion loop stopping");
        self.state = IngesterState::Stopped;

        Ok(())
    }
}

/// Sleep for `delay`, returning early with `true` if a stop is requested.
async fn stop_requested_during(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow_and_update() {
                    return true;
                }
            }
        }
    }
}
