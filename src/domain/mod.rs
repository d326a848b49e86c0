//! Domain layer: connection identity, guest-count messages, and the
//! presence registry.
//!
//! The registry is the only shared mutable state in the service. Everything
//! else in the crate either feeds connection handles into it or reads the
//! count back out.

pub mod connection_id;
pub mod guest_count;
pub mod presence_registry;

pub use connection_id::ConnectionId;
pub use guest_count::{DeliveryError, GuestCountMessage};
pub use presence_registry::{GuestHandle, PresenceRegistry};
