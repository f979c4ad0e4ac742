//! Axum middleware and API error mapping.

pub mod error;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
