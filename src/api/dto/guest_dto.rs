//! Guest-count DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body of `GET /guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GuestCountResponse {
    /// Number of guests currently connected over WebSocket.
    pub count: usize,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests.
    pub status: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Number of guests currently connected.
    pub guest_count: usize,
}
