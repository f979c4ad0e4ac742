//! CLI entry point for the token transfer indexer.
//!
//! ```text
//! main.rs      tracing setup, exit code
//!   └─ cli     argument parsing, config loading
//!        └─ lifecycle::serve
//!             ├─ ingester   (background task)
//!             └─ api        (axum server)
//! ```

use token_transfer_indexer::{cli, observability};
use tracing::error;

#[tokio::main]
async fn main() {
    // RUST_LOG, LOG_JSON and LOG_FILE control output, e.g.
    //   RUST_LOG=token_transfer_indexer=debug,sqlx=warn cargo run -- serve
    //   LOG_JSON=true LOG_FILE=./logs/indexer.log cargo run
    let _guard = match observability::init_tracing(&observability::LogSettings::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
