//! Error types for the transfer indexer.
//!
//! This module provides a unified error type [`IndexerError`] whose variants
//! drive the ingestion loop's failure policy:
//!
//! - [`IndexerError::ConfigError`]: Configuration and environment issues
//! - [`IndexerError::TransportError`]: RPC provider and network errors
//! - [`IndexerError::DecodeError`]: Malformed log entries
//! - [`IndexerError::PersistenceError`]: Database and storage faults
//!
//! A transport failure costs one cycle, a decode failure costs one log entry,
//! and a persistence failure aborts the cycle without advancing the progress
//! pointer. See [`crate::ingester`] for where each policy is applied.
//!
//! # Example
//!
//! ```
//! use token_transfer_indexer::error::{IndexerError, IndexerResult};
//!
//! fn require_topics(topics: usize) -> IndexerResult<()> {
//!     if topics < 3 {
//!         return Err(IndexerError::decode("Transfer log needs 3 topics", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`IndexerError`].
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Boxed source error carried by every [`IndexerError`] variant.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the transfer indexer.
#[derive(Debug)]
pub enum IndexerError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing or invalid environment variables
    /// - Invalid contract addresses or URLs
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// RPC provider or network errors.
    ///
    /// Variants include:
    /// - Provider unreachable
    /// - Malformed JSON-RPC response
    /// - Provider-side rejection of a log query
    TransportError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Log decoding errors.
    ///
    /// Variants include:
    /// - Missing or short topic list
    /// - Missing transaction hash or block number
    /// - Unparsable amount payload
    DecodeError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Database operation errors.
    ///
    /// Variants include:
    /// - Connection failures
    /// - Query execution errors
    /// - Migration failures
    PersistenceError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },
}

/// Coarse classification of an [`IndexerError`].
///
/// Used by the ingestion loop to pick a failure policy and as the `kind`
/// label on failure metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`IndexerError::ConfigError`].
    Config,
    /// See [`IndexerError::TransportError`].
    Transport,
    /// See [`IndexerError::DecodeError`].
    Decode,
    /// See [`IndexerError::PersistenceError`].
    Persistence,
}

impl ErrorKind {
    /// Stable lowercase name, used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Persistence => "persistence",
        }
    }
}

impl IndexerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use token_transfer_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::config("RPC_URL not set", None);
    /// assert!(matches!(err, IndexerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new transport error.
    ///
    /// # Example
    ///
    /// ```
    /// use token_transfer_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::transport("eth_getLogs failed", None);
    /// assert!(matches!(err, IndexerError::TransportError { .. }));
    /// ```
    #[must_use]
    pub fn transport(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::TransportError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decode error.
    ///
    /// # Example
    ///
    /// ```
    /// use token_transfer_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::decode("missing topics", None);
    /// assert!(matches!(err, IndexerError::DecodeError { .. }));
    /// ```
    #[must_use]
    pub fn decode(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::DecodeError {
            message: message.into(),
            source,
        }
    }

    /// Create a new persistence error.
    ///
    /// # Example
    ///
    /// ```
    /// use token_transfer_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::persistence("database is locked", None);
    /// assert!(matches!(err, IndexerError::PersistenceError { .. }));
    /// ```
    #[must_use]
    pub fn persistence(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::PersistenceError {
            message: message.into(),
            source,
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigError { .. } => ErrorKind::Config,
            Self::TransportError { .. } => ErrorKind::Transport,
            Self::DecodeError { .. } => ErrorKind::Decode,
            Self::PersistenceError { .. } => ErrorKind::Persistence,
        }
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::TransportError { message, .. } => write!(f, "Transport error: {message}"),
            Self::DecodeError { message, .. } => write!(f, "Decode error: {message}"),
            Self::PersistenceError { message, .. } => write!(f, "Persistence error: {message}"),
        }
    }
}

impl std::error::Error for IndexerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::TransportError { source, .. }
            | Self::DecodeError { source, .. }
            | Self::PersistenceError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = IndexerError::config("test error", None);
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_transport_error() {
        let err = IndexerError::transport("connection refused", None);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_decode_error() {
        let err = IndexerError::decode("invalid log", None);
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.to_string(), "Decode error: invalid log");
    }

    #[test]
    fn test_persistence_error() {
        let err = IndexerError::persistence("disk full", None);
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.to_string(), "Persistence error: disk full");
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = IndexerError::config("failed to load", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Configuration error: failed to load");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::Transport.as_str(), "transport");
        assert_eq!(ErrorKind::Persistence.as_str(), "persistence");
    }
}
