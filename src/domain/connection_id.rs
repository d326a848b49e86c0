//! Type-safe connection handle identifier.
//!
//! [`ConnectionId`] wraps a [`uuid::Uuid`] (v4) so that guest connection
//! handles cannot be confused with any other identifier in the service.

use std::fmt;

/// Opaque identifier for one open guest WebSocket connection.
///
/// Generated once when the connection is accepted and never reused: a
/// reconnecting client always receives a brand-new id. Used as the key in
/// [`super::PresenceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
