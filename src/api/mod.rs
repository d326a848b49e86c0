//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Endpoints are mounted at the root, next to the `/ws` upgrade route, so
//! existing clients keep their paths.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "guest-presence", description = "Live guest count for event photo sharing"),
    paths(
        handlers::guest::guest_count_handler,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::GuestCountResponse,
        dto::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Guests", description = "Connected guest count"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = handlers::routes();

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
