//! Service layer: connection lifecycle orchestration.
//!
//! [`PresenceService`] hands each WebSocket connection a registered
//! [`GuestSession`] and guarantees the matching unregister when the session
//! is dropped.

pub mod presence_service;

pub use presence_service::{GuestSession, PresenceGuard, PresenceService};
