//! Server error types with HTTP status code mapping.
//!
//! [`ServerError`] covers the failures a client can actually observe. The
//! presence tracker itself never produces one: delivery problems are
//! recovered inside the registry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "route not found: /nope",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category  | HTTP Status             |
/// |-----------|-----------|-------------------------|
/// | 2000–2999 | Not Found | 404 Not Found           |
/// | 3000–3999 | Server    | 503 Service Unavailable |
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// No route matches the request path.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// The server is draining connections and accepts no new guests.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::RouteNotFound(_) => 2001,
            Self::ShuttingDown => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
