//! WebSocket frame encoding and inbound frame classification.

use axum::extract::ws::Message;

use crate::domain::GuestCountMessage;

/// What the connection loop should do with a frame received from a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundAction {
    /// Keep the connection open; the frame carries nothing for the server.
    Ignore,
    /// The guest closed the connection.
    Close,
    /// The guest answered a keepalive ping.
    Pong,
}

/// Encodes a count update as a text frame.
///
/// # Errors
///
/// Returns the serializer error if the message cannot be encoded.
pub fn encode_guest_count(message: &GuestCountMessage) -> Result<Message, serde_json::Error> {
    serde_json::to_string(message).map(Message::text)
}

/// Classifies a frame sent by a guest.
///
/// Guests never need to talk to the server, so text and binary payloads are
/// dropped. Pings are answered by the transport itself; pongs feed the
/// keepalive check.
#[must_use]
pub fn classify_inbound(message: &Message) -> InboundAction {
    match message {
        Message::Close(_) => InboundAction::Close,
        Message::Pong(_) => InboundAction::Pong,
        Message::Text(_) | Message::Binary(_) | Message::Ping(_) => InboundAction::Ignore,
    }
}
