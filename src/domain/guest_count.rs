//! Guest-count notification and per-handle delivery failures.
//!
//! Every registry mutation produces a fresh [`GuestCountMessage`] that is
//! fanned out to all open connections. Delivery to a single handle can fail
//! with a [`DeliveryError`]; such failures are recovered locally by the
//! registry and never reach the caller.

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

/// Current number of connected guests at the moment of a broadcast.
///
/// Serialized as `{"guestCount": <integer>}` for existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCountMessage {
    /// Number of registered connections.
    pub guest_count: usize,
}

impl GuestCountMessage {
    /// Creates a message carrying `guest_count`.
    #[must_use]
    pub const fn new(guest_count: usize) -> Self {
        Self { guest_count }
    }
}

/// Failed delivery of a [`GuestCountMessage`] to one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection task dropped its receiving end.
    #[error("connection closed")]
    Closed,

    /// The handle's outbound queue is full; the client is not draining it.
    #[error("outbound queue full")]
    Backpressure,
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::Backpressure,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}
