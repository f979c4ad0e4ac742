//! Observability: structured logging and metrics.
//!
//! - [`init_tracing`]: `tracing` subscriber with pretty or JSON console output
//!   and an optional daily-rotated JSON log file
//! - [`metrics`]: Prometheus registry shared by the ingestion loop and the API
//!
//! # Environment Configuration
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=token_transfer_indexer=debug,sqlx=warn cargo run -- serve
//!
//! # JSON console output for log aggregation
//! LOG_JSON=true cargo run -- serve
//!
//! # Also write JSON logs to a daily-rotated file
//! LOG_FILE=./logs/indexer.log cargo run -- serve
//! ```

pub mod metrics;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::BoxError;

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_LOG_FILTER: &str = "token_transfer_indexer=info,warn";

/// Logging options, usually read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive; falls back to [`DEFAULT_LOG_FILTER`].
    pub filter: Option<String>,
    /// Path of a log file to rotate daily.
    pub file: Option<PathBuf>,
    /// JSON console output instead of pretty output.
    pub json: bool,
}

impl LogSettings {
    /// Read `RUST_LOG`, `LOG_FILE` and `LOG_JSON`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            filter: lookup("RUST_LOG").filter(|f| !f.trim().is_empty()),
            file: lookup("LOG_FILE")
                .filter(|f| !f.trim().is_empty())
                .map(PathBuf::from),
            json: lookup("LOG_JSON")
                .and_then(|v| v.trim().parse::<bool>().ok())
                .unwrap_or(false),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::new(self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    }
}

/// Keeps the background file writer alive; drop it only at process exit.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
///
/// The console layer is pretty-printed with thread info, or JSON with span
/// context when `settings.json` is set. A configured log file always receives
/// JSON.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(settings: &LogSettings) -> Result<TracingGuard, BoxError> {
    let console_layer = if settings.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    let (file_layer, file_writer) = match settings.file {
        Some(ref path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;

            let appender = tracing_appender::rolling::daily(
                directory,
                path.file_name().unwrap_or_else(|| OsStr::new("indexer.log")),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output = settings.json,
        file_logging = settings.file.is_some(),
        "Tracing initialized"
    );

    Ok(TracingGuard {
        _file_writer: file_writer,
    })
}

/// Route logs to the test harness; safe to call from every test.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> LogSettings {
        let map: HashMap<_, _> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LogSettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_log_settings_defaults() {
        let settings = settings_from(&[]);
        assert_eq!(settings, LogSettings::default());
        assert!(!settings.json);
    }

    #[test]
    fn test_log_settings_from_env_vars() {
        let settings = settings_from(&[
            ("RUST_LOG", "debug"),
            ("LOG_FILE", "./logs/indexer.log"),
            ("LOG_JSON", "true"),
        ]);

        assert_eq!(settings.filter.as_deref(), Some("debug"));
        assert_eq!(settings.file, Some(PathBuf::from("./logs/indexer.log")));
        assert!(settings.json);
    }

    #[test]
    fn test_invalid_log_json_is_false() {
        assert!(!settings_from(&[("LOG_JSON", "yes please")]).json);
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        init_test_tracing();
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            file: Some(dir.path().join("nested").join("indexer.log")),
            ..LogSettings::default()
        };

        assert!(init_tracing(&settings).is_err());
        assert!(dir.path().join("nested").is_dir());
    }
}
