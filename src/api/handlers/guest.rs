//! Guest-count query for clients that poll instead of holding a socket.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::GuestCountResponse;
use crate::app_state::AppState;

/// `GET /guest` — Current number of connected guests.
#[utoipa::path(
    get,
    path = "/guest",
    tag = "Guests",
    summary = "Current guest count",
    description = "Returns how many guests hold an open WebSocket connection right now. Reading the count never triggers a broadcast.",
    responses(
        (status = 200, description = "Current guest count", body = GuestCountResponse),
    )
)]
pub async fn guest_count_handler(State(state): State<AppState>) -> Json<GuestCountResponse> {
    Json(GuestCountResponse {
        count: state.presence.guest_count(),
    })
}

/// Guest routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/guest", get(guest_count_handler))
}
