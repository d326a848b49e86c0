//! Presence service: pairs every guest connection with guaranteed cleanup.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{ConnectionId, GuestCountMessage, GuestHandle, PresenceRegistry};

/// Orchestration layer between the WebSocket transport and the
/// [`PresenceRegistry`].
///
/// Each call to [`PresenceService::join`] registers a new handle and hands
/// back a [`GuestSession`] whose guard unregisters it when dropped, so the
/// connection routine cannot leave a stale handle behind on any exit path.
#[derive(Debug, Clone)]
pub struct PresenceService {
    registry: Arc<PresenceRegistry>,
    queue_capacity: usize,
}

impl PresenceService {
    /// Creates a new `PresenceService`.
    ///
    /// `queue_capacity` bounds each connection's outbound queue; a guest
    /// that lets it fill up is dropped from the registry. Values below 1
    /// are raised to 1.
    #[must_use]
    pub fn new(registry: Arc<PresenceRegistry>, queue_capacity: usize) -> Self {
        Self {
            registry,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Returns a reference to the inner [`PresenceRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Registers a new guest connection.
    ///
    /// The returned session's queue already holds the count produced by
    /// this registration.
    #[must_use]
    pub fn join(&self) -> GuestSession {
        let id = ConnectionId::new();
        let (sender, updates) = mpsc::channel(self.queue_capacity);
        let registered = self.registry.register(GuestHandle::new(id, sender));
        debug_assert!(registered, "fresh connection id already registered");

        GuestSession {
            updates,
            guard: PresenceGuard {
                id,
                registry: Arc::clone(&self.registry),
            },
        }
    }

    /// Returns the number of currently connected guests.
    #[must_use]
    pub fn guest_count(&self) -> usize {
        self.registry.current_count()
    }
}

/// Unregisters its connection from the registry when dropped.
#[derive(Debug)]
pub struct PresenceGuard {
    id: ConnectionId,
    registry: Arc<PresenceRegistry>,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        if !self.registry.unregister(self.id) {
            tracing::debug!(connection_id = %self.id, "guest already evicted");
        }
    }
}

/// One registered guest connection as seen by its connection task.
#[derive(Debug)]
pub struct GuestSession {
    updates: mpsc::Receiver<GuestCountMessage>,
    guard: PresenceGuard,
}

impl GuestSession {
    /// Returns this session's connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.guard.id
    }

    /// Waits for the next count update.
    ///
    /// Returns `None` once the registry has evicted this connection.
    pub async fn next_update(&mut self) -> Option<GuestCountMessage> {
        self.updates.recv().await
    }
}
