//! # guest-presence
//!
//! Live guest count for event photo sharing.
//!
//! Guests keep a WebSocket open at `/ws`; whenever one connects or leaves,
//! every open socket receives `{"guestCount": n}`. Clients that only poll
//! read the same number from `GET /guest`.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + connection loop (ws/)
//!     │
//!     ├── PresenceService + PresenceGuard (service/)
//!     │
//!     └── PresenceRegistry (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod ws;
