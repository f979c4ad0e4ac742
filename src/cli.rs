//! Command-line interface for the transfer indexer.
//!
//! # Commands
//!
//! - `serve` (default): run migrations, the ingestion loop and the HTTP API
//! - `count`: print the number of stored transfers
//! - `head`: print the chain head seen by the configured RPC endpoint
//!
//! # Example
//!
//! ```bash
//! token-transfer-indexer serve --port 9000 --poll-interval 5
//! token-transfer-indexer count --recent 5
//! token-transfer-indexer head
//! ```

use crate::config::Config;
use crate::db::{create_pool, Repository, TransferStore};
use crate::db::models::TransferRecord;
use crate::lifecycle;
use crate::rpc::{LogSource, RpcLogSource};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, WrapErr};
use tracing::info;

/// ERC-20 Transfer event indexer
#[derive(Parser, Debug)]
#[command(name = "token-transfer-indexer")]
#[command(about = "Polls a token contract for Transfer events and stores them", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute (default: serve)
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the indexer and its HTTP API until interrupted
    Serve {
        /// API port (overrides API_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Seconds between poll cycles (overrides POLL_INTERVAL)
        #[arg(short = 'i', long)]
        poll_interval: Option<u64>,
    },

    /// Print the number of stored transfers
    Count {
        /// Also list the most recent transfers
        #[arg(short, long)]
        recent: Option<u32>,
    },

    /// Print the current chain head block
    Head,
}

impl Default for Commands {
    fn default() -> Self {
        Self::Serve {
            port: None,
            poll_interval: None,
        }
    }
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - Database or RPC connection fails
/// - Command execution fails
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().wrap_err("Invalid configuration")?;

    match cli.command.unwrap_or_default() {
        Commands::Serve {
            port,
            poll_interval,
        } => run_serve_command(apply_overrides(config, port, poll_interval)).await,
        Commands::Count { recent } => run_count_command(&config, recent).await,
        Commands::Head => run_head_command(&config).await,
    }
}

fn apply_overrides(mut config: Config, port: Option<u16>, poll_interval: Option<u64>) -> Config {
    if let Some(port) = port {
        config = config.with_api_port(port);
    }
    if let Some(secs) = poll_interval {
        config = config.with_poll_interval_secs(secs);
    }
    config
}

async fn run_serve_command(config: Config) -> Result<()> {
    println!(
        "{} {} on port {}",
        "Indexing Transfer events of".cyan().bold(),
        config.token_address().to_string().yellow(),
        config.api_port().to_string().yellow()
    );

    lifecycle::serve(config).await?;

    println!("{}", "Shutdown complete".green().bold());
    Ok(())
}

async fn run_count_command(config: &Config, recent: Option<u32>) -> Result<()> {
    let pool = create_pool(config.database_url())
        .await
        .wrap_err("Failed to open database")?;
    let repository = Repository::new(pool);

    let count = repository.count().await.wrap_err("Failed to count transfers")?;
    info!(count, "Counted stored transfers");
    println!(
        "{} {}",
        "Transfers stored:".cyan().bold(),
        count.to_string().yellow().bold()
    );

    if let Some(limit) = recent {
        let transfers = repository
            .recent_transfers(limit)
            .await
            .wrap_err("Failed to load recent transfers")?;
        for transfer in &transfers {
            println!("{}", format_transfer(transfer));
        }
    }

    Ok(())
}

async fn run_head_command(config: &Config) -> Result<()> {
    let source = RpcLogSource::connect(config.rpc_url())
        .await
        .wrap_err("Failed to create RPC provider")?;
    let head = source
        .block_number()
        .await
        .wrap_err("Failed to fetch chain head")?;

    println!(
        "{} {}",
        "Chain head:".cyan().bold(),
        head.to_string().yellow().bold()
    );
    Ok(())
}

/// One line per stored transfer.
fn format_transfer(record: &TransferRecord) -> String {
    format!(
        "{} {} {} -> {} {}",
        format!("#{}", record.block_number).yellow(),
        record.tx_hash.dimmed(),
        record.from_address.blue(),
        record.to_address.magenta(),
        record.value.green()
    )
}
