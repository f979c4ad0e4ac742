//! Process lifecycle: start the ingestion loop and the API, stop both cleanly.
//!
//! ```text
//! serve()
//!   ├─ create_pool + migrations     (fatal on error)
//!   ├─ RPC connection check         (fatal on error)
//!   ├─ Ingester::initialize         (fatal on error)
//!   ├─ bind API port                (fatal on error)
//!   ├─ spawn ingestion loop ──┐
//!   ├─ spawn API server ──────┤ both watch the same stop channel
//!   └─ SIGINT / SIGTERM ──────┘ stop = true → server drains → loop joined
//! ```

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api;
use crate::app_state::AppState;
use crate::config::Config;
use crate::db::{create_pool, Repository, TransferStore};
use crate::error::IndexerResult;
use crate::ingester::{Ingester, IngesterSettings};
use crate::observability::metrics::Metrics;
use crate::rpc::{check_connection, LogSource, RpcLogSource};

/// Owns the stop channel and the background ingestion task.
#[derive(Debug)]
pub struct Lifecycle {
    stop_tx: watch::Sender<bool>,
    ingestion: JoinHandle<IndexerResult<()>>,
}

impl Lifecycle {
    /// Spawn `ingester`'s loop on the runtime.
    pub fn start<L, S>(mut ingester: Ingester<L, S>) -> Self
    where
        L: LogSource + 'static,
        S: TransferStore + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let ingestion = tokio::spawn(async move { ingester.run(stop_rx).await });
        Self { stop_tx, ingestion }
    }

    /// A receiver that turns `true` once stop is requested.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Ask every subscriber to stop. Idempotent.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Whether the ingestion task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ingestion.is_finished()
    }

    /// Request stop and wait for the ingestion loop to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop task panicked or failed to initialize.
    pub async fn shutdown(self) -> Result<()> {
        self.request_stop();
        self.ingestion
            .await
            .wrap_err("Ingestion task panicked")?
            .wrap_err("Ingestion loop failed")
    }
}

/// Run the indexer service until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if any startup step fails or the API server stops with an
/// error.
pub async fn serve(config: Config) -> Result<()> {
    let pool = create_pool(config.database_url())
        .await
        .wrap_err("Failed to open database")?;
    let repository = Arc::new(Repository::new(pool));

    let source = RpcLogSource::connect(config.rpc_url())
        .await
        .wrap_err("Failed to create RPC provider")?;
    check_connection(source.provider())
        .await
        .wrap_err("RPC node unreachable")?;

    let metrics = Arc::new(Metrics::new());

    let mut ingester = Ingester::new(
        source,
        Arc::clone(&repository),
        IngesterSettings::from(&config),
    )
    .with_metrics(metrics.ingest.clone());
    ingester
        .initialize()
        .await
        .wrap_err("Failed to initialize ingester")?;

    let listener = api::server::bind(config.api_port())
        .await
        .wrap_err_with(|| format!("Failed to bind API port {}", config.api_port()))?;

    let store: Arc<dyn TransferStore> = repository;
    let state = AppState::new(store, metrics);
    let router = api::build_router(state, config.rate_limit_rpm(), config.cors_origins());

    let lifecycle = Lifecycle::start(ingester);
    let mut server = tokio::spawn(api::run_server(listener, router, lifecycle.subscribe()));

    info!(
        token = %config.token_address(),
        port = config.api_port(),
        "Indexer running"
    );

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        result = &mut server => {
            error!("API server exited unexpectedly");
            lifecycle.shutdown().await?;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).wrap_err("API server failed"),
                Err(e) => Err(e).wrap_err("API server task panicked"),
            };
        }
    }

    lifecycle.request_stop();
    server
        .await
        .wrap_err("API server task panicked")?
        .wrap_err("API server failed")?;
    lifecycle.shutdown().await?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
