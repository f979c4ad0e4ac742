//! Configuration management for the transfer indexer.
//!
//! This module handles loading and validating configuration from environment variables
//! using the `dotenvy` crate. All operations return [`IndexerResult`] for comprehensive
//! error handling.
//!
//! ## Environment Variables
//!
//! Required:
//! - `DATABASE_URL`: SQLite connection string (e.g. `sqlite:./transfers.db`)
//! - `RPC_URL`: HTTP(S) JSON-RPC endpoint of the chain node
//! - `TOKEN_ADDRESS`: Address of the token contract to index
//!
//! Optional (with defaults):
//! - `POLL_INTERVAL`: Seconds between poll cycles (default: 10)
//! - `API_PORT`: Port for the health/metrics server (default: 8000)
//! - `MAX_BLOCK_RANGE`: Upper bound on blocks per log query (default: unbounded)
//! - `MAX_BACKOFF_SECS`: Cap on retry delay after failing cycles (default: 300)
//! - `RATE_LIMIT_RPM`: API requests per minute (default: 600)
//! - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
//! - `RESUME_FROM_CHECKPOINT`: Resume from the stored checkpoint (default: false).
//!   Only `true` or `false` is accepted; `1`, `yes` and the like fail startup.
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use token_transfer_indexer::config::Config;
//! use token_transfer_indexer::error::IndexerResult;
//!
//! # fn main() -> IndexerResult<()> {
//! let config = Config::from_env()?;
//! println!("Indexing {}", config.token_address());
//! # Ok(())
//! # }
//! ```

use crate::error::{IndexerError, IndexerResult};
use alloy::primitives::Address;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_API_PORT: u16 = 8000;
const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;
const DEFAULT_RATE_LIMIT_RPM: u32 = 600;

/// Main configuration struct for the indexer.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string
    database_url: String,

    /// Chain JSON-RPC endpoint
    rpc_url: String,

    /// Token contract whose Transfer events are indexed
    token_address: Address,

    /// Polling interval in seconds
    poll_interval_secs: u64,

    /// Port for the HTTP server
    api_port: u16,

    /// Maximum blocks to fetch per query (None = up to head)
    max_block_range: Option<u64>,

    /// Upper bound on the retry delay in seconds
    max_backoff_secs: u64,

    /// API rate limit (requests per minute)
    rate_limit_rpm: u32,

    /// Allowed CORS origins
    cors_origins: Vec<String>,

    /// Resume the progress pointer from the stored checkpoint
    resume_from_checkpoint: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for optional variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variable values are invalid (e.g., non-numeric for numbers)
    /// - `TOKEN_ADDRESS` is not a valid address
    pub fn from_env() -> IndexerResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// [`Config::from_env`] delegates here with `std::env::var`; tests pass a map.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> IndexerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DATABASE_URL")?;

        let rpc_url = required(&lookup, "RPC_URL")?;
        if !rpc_url.starts_with("http") {
            return Err(IndexerError::config(
                format!("RPC_URL must be an http(s) URL, got: {rpc_url}"),
                None,
            ));
        }

        let token_address_raw = required(&lookup, "TOKEN_ADDRESS")?;
        let token_address = Address::from_str(token_address_raw.trim()).map_err(|e| {
            IndexerError::config(
                format!(
                    "TOKEN_ADDRESS must be a valid address (0x + 40 hex chars), got: {token_address_raw}"
                ),
                Some(Box::new(e)),
            )
        })?;

        let poll_interval_secs: u64 =
            parse_or(&lookup, "POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(IndexerError::config(
                "POLL_INTERVAL must be at least 1 second",
                None,
            ));
        }

        let api_port: u16 = parse_or(&lookup, "API_PORT", DEFAULT_API_PORT)?;

        let max_block_range = match lookup("MAX_BLOCK_RANGE") {
            Some(raw) if !raw.trim().is_empty() => {
                let range = raw.trim().parse::<u64>().map_err(|e| {
                    IndexerError::config(
                        "MAX_BLOCK_RANGE must be a valid number",
                        Some(Box::new(e)),
                    )
                })?;
                if range == 0 {
                    return Err(IndexerError::config(
                        "MAX_BLOCK_RANGE must be at least 1",
                        None,
                    ));
                }
                Some(range)
            }
            _ => None,
        };

        let max_backoff_secs: u64 =
            parse_or(&lookup, "MAX_BACKOFF_SECS", DEFAULT_MAX_BACKOFF_SECS)?;

        let rate_limit_rpm: u32 = parse_or(&lookup, "RATE_LIMIT_RPM", DEFAULT_RATE_LIMIT_RPM)?;
        if rate_limit_rpm == 0 {
            return Err(IndexerError::config("RATE_LIMIT_RPM must be at least 1", None));
        }

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let resume_from_checkpoint: bool = parse_or(&lookup, "RESUME_FROM_CHECKPOINT", false)?;

        Ok(Self {
            database_url,
            rpc_url,
            token_address,
            poll_interval_secs,
            api_port,
            max_block_range,
            max_backoff_secs,
            rate_limit_rpm,
            cors_origins,
            resume_from_checkpoint,
        })
    }

    /// Override the polling interval (e.g. from a CLI flag). Clamped to 1 second.
    #[must_use]
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs.max(1);
        self
    }

    /// Override the API port (e.g. from a CLI flag).
    #[must_use]
    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }

    /// Get the database connection string.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Get the chain RPC URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the indexed token contract address.
    #[must_use]
    pub const fn token_address(&self) -> Address {
        self.token_address
    }

    /// Get the polling interval in seconds.
    #[must_use]
    pub const fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    /// Get the polling interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get the HTTP server port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Get the optional maximum block range per query.
    #[must_use]
    pub const fn max_block_range(&self) -> Option<u64> {
        self.max_block_range
    }

    /// Get the retry delay cap.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// Get the API rate limit in requests per minute.
    #[must_use]
    pub const fn rate_limit_rpm(&self) -> u32 {
        self.rate_limit_rpm
    }

    /// Get the allowed CORS origins.
    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    /// Whether the loop resumes from the stored checkpoint.
    #[must_use]
    pub const fn resume_from_checkpoint(&self) -> bool {
        self.resume_from_checkpoint
    }
}

fn required<F>(lookup: &F, key: &str) -> IndexerResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(IndexerError::config(
            format!("{key} environment variable is required"),
            None,
        )),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> IndexerResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            IndexerError::config(format!("{key} has an invalid value: {raw}"), Some(Box::new(e)))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOKEN: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "sqlite::memory:"),
            ("RPC_URL", "http://localhost:8545"),
            ("TOKEN_ADDRESS", TOKEN),
        ]
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&base())).unwrap();

        assert_eq!(config.poll_interval_secs(), 10);
        assert_eq!(config.api_port(), 8000);
        assert_eq!(config.max_block_range(), None);
        assert_eq!(config.cors_origins(), ["*".to_string()]);
        assert!(!config.resume_from_checkpoint());
        assert_eq!(config.token_address(), TOKEN.parse::<Address>().unwrap());
    }

    #[test]
    fn test_config_missing_rpc_url() {
        let pairs: Vec<_> = base().into_iter().filter(|(k, _)| *k != "RPC_URL").collect();
        let result = Config::from_lookup(lookup_from(&pairs));
        assert!(matches!(result, Err(IndexerError::ConfigError { .. })));
    }

    #[test]
    fn test_config_invalid_token_address() {
        let mut pairs = base();
        pairs.retain(|(k, _)| *k != "TOKEN_ADDRESS");
        pairs.push(("TOKEN_ADDRESS", "invalid_address"));

        let result = Config::from_lookup(lookup_from(&pairs));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_poll_interval() {
        let mut pairs = base();
        pairs.push(("POLL_INTERVAL", "ten"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = base();
        pairs.push(("POLL_INTERVAL", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_config_optional_overrides() {
        let mut pairs = base();
        pairs.push(("POLL_INTERVAL", "3"));
        pairs.push(("MAX_BLOCK_RANGE", "500"));
        pairs.push(("CORS_ORIGINS", "http://a.test, http://b.test"));
        pairs.push(("RESUME_FROM_CHECKPOINT", "true"));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.max_block_range(), Some(500));
        assert_eq!(config.cors_origins().len(), 2);
        assert!(config.resume_from_checkpoint());
    }

    #[test]
    fn test_resume_flag_accepts_only_true_or_false() {
        for raw in ["1", "yes", "on"] {
            let mut pairs = base();
            pairs.push(("RESUME_FROM_CHECKPOINT", raw));
            let result = Config::from_lookup(lookup_from(&pairs));
            assert!(matches!(result, Err(IndexerError::ConfigError { .. })), "{raw} accepted");
        }

        let mut pairs = base();
        pairs.push(("RESUME_FROM_CHECKPOINT", "false"));
        assert!(!Config::from_lookup(lookup_from(&pairs)).unwrap().resume_from_checkpoint());
    }

    #[test]
    fn test_config_zero_block_range_rejected() {
        let mut pairs = base();
        pairs.push(("MAX_BLOCK_RANGE", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::from_lookup(lookup_from(&base()))
            .unwrap()
            .with_poll_interval_secs(30)
            .with_api_port(9090);
        assert_eq!(config.poll_interval_secs(), 30);
        assert_eq!(config.api_port(), 9090);
    }
}
