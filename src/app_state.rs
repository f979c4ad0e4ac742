//! Shared application state for API handlers.

use std::sync::Arc;

use crate::db::TransferStore;
use crate::observability::metrics::Metrics;

/// Shared application state for API handlers.
///
/// The store handle is the same one the ingestion loop writes through; reads
/// go through its connection pool.
#[derive(Clone)]
pub struct AppState {
    /// Transfer store used for counts.
    pub store: Arc<dyn TransferStore>,
    /// Process-wide metrics registry.
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new `AppState` instance.
    #[must_use]
    pub fn new(store: Arc<dyn TransferStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }
}
