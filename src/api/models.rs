//! API response models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Liveness response with the number of stored transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `true` when the store could be read
    pub ok: bool,
    /// Number of transfers persisted so far
    pub events_collected: u64,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Optional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
