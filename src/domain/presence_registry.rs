//! Process-wide registry of open guest connections.
//!
//! [`PresenceRegistry`] stores every live connection handle in a
//! `HashMap` behind a single [`std::sync::Mutex`]. The guest count is the
//! map's cardinality, so it can never drift from the set of handles.
//!
//! Every mutation fans the new count out to all handles while still holding
//! the lock. Delivery is a non-blocking enqueue onto each handle's bounded
//! queue, so the critical section never waits on a socket, and every handle
//! observes counts in exactly the order the mutations were applied.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::{ConnectionId, DeliveryError, GuestCountMessage};

/// Registry-side end of one guest connection.
///
/// Pairs the connection's id with the sending half of its bounded outbound
/// queue. The connection task owns the receiving half and writes whatever
/// arrives to the socket.
#[derive(Debug, Clone)]
pub struct GuestHandle {
    id: ConnectionId,
    sender: mpsc::Sender<GuestCountMessage>,
}

impl GuestHandle {
    /// Creates a handle for `id` delivering into `sender`.
    #[must_use]
    pub const fn new(id: ConnectionId, sender: mpsc::Sender<GuestCountMessage>) -> Self {
        Self { id, sender }
    }

    /// Returns the connection id of this handle.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    fn deliver(&self, message: GuestCountMessage) -> Result<(), DeliveryError> {
        self.sender.try_send(message).map_err(DeliveryError::from)
    }
}

/// Shared set of open guest connections and its derived count.
///
/// # Concurrency
///
/// - `register`, `unregister` and `broadcast` are serialized by one mutex.
/// - Fan-out happens inside the critical section but never blocks: each
///   handle gets a single `try_send` attempt.
/// - A handle whose attempt fails is dropped on the spot and the new count
///   is fanned out again to the survivors.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    handles: Mutex<HashMap<ConnectionId, GuestHandle>>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly accepted connection and broadcasts the new count to
    /// every handle, the new one included.
    ///
    /// Returns `false` without touching the registry if a handle with the
    /// same id is already present.
    pub fn register(&self, handle: GuestHandle) -> bool {
        let mut handles = self.lock();
        let id = handle.id;
        if handles.contains_key(&id) {
            tracing::warn!(connection_id = %id, "duplicate registration ignored");
            return false;
        }
        handles.insert(id, handle);

        let guest_count = handles.len();
        tracing::info!(connection_id = %id, guest_count, "guest connected");
        fan_out(&mut handles, GuestCountMessage::new(guest_count));
        true
    }

    /// Removes a connection and broadcasts the new count to the remaining
    /// handles.
    ///
    /// Idempotent: returns `false` and broadcasts nothing if `id` is not
    /// registered, which happens when the registry already evicted it.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut handles = self.lock();
        if handles.remove(&id).is_none() {
            return false;
        }

        let guest_count = handles.len();
        tracing::info!(connection_id = %id, guest_count, "guest disconnected");
        fan_out(&mut handles, GuestCountMessage::new(guest_count));
        true
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn current_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `message` to every registered handle.
    ///
    /// Handles that cannot accept the message are unregistered, after which
    /// the corrected count is delivered to the rest.
    pub fn broadcast(&self, message: GuestCountMessage) {
        let mut handles = self.lock();
        fan_out(&mut handles, message);
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, GuestHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Delivers `message` to all handles, evicting failures until a full round
/// succeeds. Each round removes at least one handle, so this terminates.
fn fan_out(handles: &mut HashMap<ConnectionId, GuestHandle>, message: GuestCountMessage) {
    let mut message = message;
    loop {
        let failed: Vec<ConnectionId> = handles
            .values()
            .filter_map(|handle| match handle.deliver(message) {
                Ok(()) => None,
                Err(err) => {
                    tracing::warn!(
                        connection_id = %handle.id,
                        error = %err,
                        "dropping guest after failed delivery"
                    );
                    Some(handle.id)
                }
            })
            .collect();

        if failed.is_empty() {
            return;
        }
        for id in &failed {
            handles.remove(id);
        }
        message = GuestCountMessage::new(handles.len());
    }
}
