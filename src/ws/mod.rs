//! WebSocket layer: upgrade handling and the per-connection loop.
//!
//! The endpoint at `/ws` keeps one persistent connection per guest and
//! pushes `{"guestCount": n}` whenever the number of connected guests
//! changes. Guests are not expected to send anything.

pub mod connection;
pub mod handler;
pub mod messages;
