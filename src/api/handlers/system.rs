//! System endpoints: health check and route fallback.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::Utc;

use crate::api::dto::HealthResponse;
use crate::app_state::AppState;
use crate::error::ServerError;

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and guest count.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            guest_count: state.presence.guest_count(),
        }),
    )
}

/// Fallback for unmatched routes.
pub async fn not_found_handler(uri: Uri) -> ServerError {
    ServerError::RouteNotFound(uri.path().to_string())
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
