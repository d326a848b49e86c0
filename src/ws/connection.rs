//! WebSocket connection state machine.
//!
//! A connection is `OPEN` from the moment its [`GuestSession`] is joined
//! until the loop below breaks, at which point it is `CLOSED`: the session
//! is dropped, unregistering the guest, before the socket halves go away.
//!
//! Silent peers are caught by keepalive: the server pings every
//! `ping_interval` and closes the connection if no pong arrives within
//! `pong_timeout`.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, close_code};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, interval_at};

use super::messages::{InboundAction, classify_inbound, encode_guest_count};
use crate::service::GuestSession;
use crate::shutdown::ShutdownSignal;

/// Payload carried by keepalive pings.
const PING_PAYLOAD: &[u8] = b"guest";

/// Why a connection left the `OPEN` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The guest sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadError,
    /// Writing to the socket failed or did not finish in time.
    WriteError,
    /// The guest did not answer a keepalive ping in time.
    PongTimeout,
    /// The registry dropped this guest after a failed delivery.
    Evicted,
    /// The server is shutting down.
    Shutdown,
}

/// Timing knobs for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Upper bound on a single socket write.
    pub send_timeout: Duration,
    /// Time between keepalive pings.
    pub ping_interval: Duration,
    /// How long a ping may stay unanswered.
    pub pong_timeout: Duration,
}

/// Runs the read/write loop for a single guest connection.
///
/// - Forwards every count update from the session to the socket, each write
///   bounded by `send_timeout`.
/// - Reads and discards whatever the guest sends, watching for close and
///   keepalive pongs.
/// - Pings on a timer and gives up on a guest whose pong is overdue.
/// - Sends a close frame when `shutdown` fires.
pub async fn run_connection<S, E>(
    socket: S,
    mut session: GuestSession,
    settings: ConnectionSettings,
    mut shutdown: ShutdownSignal,
) -> CloseReason
where
    S: Sink<Message> + Stream<Item = Result<Message, E>>,
    S::Error: Display,
    E: Display,
{
    let connection_id = session.id();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut ping_timer = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    let mut pong_deadline: Option<Instant> = None;

    let reason = loop {
        tokio::select! {
            // Incoming frame from the guest
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(frame)) => match classify_inbound(&frame) {
                        InboundAction::Close => break CloseReason::PeerClosed,
                        InboundAction::Pong => pong_deadline = None,
                        InboundAction::Ignore => {}
                    },
                    Some(Err(err)) => {
                        tracing::debug!(connection_id = %connection_id, error = %err, "ws read failed");
                        break CloseReason::ReadError;
                    }
                    None => break CloseReason::PeerClosed,
                }
            }
            // Count update from the registry
            update = session.next_update() => {
                let Some(update) = update else {
                    break CloseReason::Evicted;
                };
                let frame = match encode_guest_count(&update) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to encode guest count");
                        continue;
                    }
                };
                if !send_frame(&mut ws_tx, frame, settings.send_timeout).await {
                    break CloseReason::WriteError;
                }
            }
            _ = ping_timer.tick() => {
                if pong_deadline.is_none() {
                    let ping = Message::Ping(PING_PAYLOAD.into());
                    if !send_frame(&mut ws_tx, ping, settings.send_timeout).await {
                        break CloseReason::WriteError;
                    }
                    pong_deadline = Some(Instant::now() + settings.pong_timeout);
                }
            }
            () = sleep_until_deadline(pong_deadline) => {
                tracing::info!(connection_id = %connection_id, "pong overdue, dropping guest");
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "pong timeout".into(),
                };
                let close = Message::Close(Some(frame));
                if !send_frame(&mut ws_tx, close, settings.send_timeout).await {
                    tracing::debug!(connection_id = %connection_id, "close frame not delivered");
                }
                break CloseReason::PongTimeout;
            }
            () = shutdown.wait() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                let close = Message::Close(Some(frame));
                if !send_frame(&mut ws_tx, close, settings.send_timeout).await {
                    tracing::debug!(connection_id = %connection_id, "close frame not delivered");
                }
                break CloseReason::Shutdown;
            }
        }
    };

    drop(session);
    tracing::debug!(connection_id = %connection_id, reason = ?reason, "ws connection closed");
    reason
}

/// Writes one frame, returning `false` if the socket is unusable.
async fn send_frame<W>(ws_tx: &mut W, frame: Message, send_timeout: Duration) -> bool
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match tokio::time::timeout(send_timeout, ws_tx.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "ws write failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout = ?send_timeout, "ws write timed out");
            false
        }
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{ConnectionId, GuestHandle, PresenceRegistry};
    use crate::service::PresenceService;
    use crate::shutdown::Shutdown;

    const HOUR: Duration = Duration::from_secs(3600);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum WriteMode {
        Accept,
        Fail,
        Stall,
    }

    /// In-memory socket: frames pushed into `inbound` are read by the loop,
    /// frames the loop writes land in `sent`.
    #[derive(Debug)]
    struct FakeSocket {
        inbound: mpsc::UnboundedReceiver<Result<Message, io::Error>>,
        sent: mpsc::UnboundedSender<Message>,
        mode: WriteMode,
    }

    struct Peer {
        inbound: mpsc::UnboundedSender<Result<Message, io::Error>>,
        sent: mpsc::UnboundedReceiver<Message>,
    }

    fn fake_socket(mode: WriteMode) -> (FakeSocket, Peer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let socket = FakeSocket {
            inbound: inbound_rx,
            sent: sent_tx,
            mode,
        };
        let peer = Peer {
            inbound: inbound_tx,
            sent: sent_rx,
        };
        (socket, peer)
    }

    impl Stream for FakeSocket {
        type Item = Result<Message, io::Error>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.inbound.poll_recv(cx)
        }
    }

    impl Sink<Message> for FakeSocket {
        type Error = io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
            match self.mode {
                WriteMode::Stall => Poll::Pending,
                WriteMode::Accept | WriteMode::Fail => Poll::Ready(Ok(())),
            }
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), io::Error> {
            match self.mode {
                WriteMode::Fail => Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")),
                WriteMode::Accept | WriteMode::Stall => {
                    let _ = self.sent.send(item);
                    Ok(())
                }
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn settings(ping_interval: Duration, pong_timeout: Duration) -> ConnectionSettings {
        ConnectionSettings {
            send_timeout: Duration::from_millis(50),
            ping_interval,
            pong_timeout,
        }
    }

    fn make_service(capacity: usize) -> PresenceService {
        PresenceService::new(Arc::new(PresenceRegistry::new()), capacity)
    }

    fn sent_frames(peer: &mut Peer) -> Vec<Message> {
        let mut frames = Vec::new();
        while let Ok(frame) = peer.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn failed_write_unregisters_guest() {
        let service = make_service(8);
        let shutdown = Shutdown::new();
        let (socket, _peer) = fake_socket(WriteMode::Fail);

        let reason = run_connection(
            socket,
            service.join(),
            settings(HOUR, HOUR),
            shutdown.subscribe(),
        )
        .await;

        assert_eq!(reason, CloseReason::WriteError);
        assert_eq!(service.guest_count(), 0);
    }

    #[tokio::test]
    async fn stalled_write_times_out_and_unregisters() {
        let service = make_service(8);
        let shutdown = Shutdown::new();
        let (socket, _peer) = fake_socket(WriteMode::Stall);

        let reason = run_connection(
            socket,
            service.join(),
            settings(HOUR, HOUR),
            shutdown.subscribe(),
        )
        .await;

        assert_eq!(reason, CloseReason::WriteError);
        assert_eq!(service.guest_count(), 0);
    }

    #[tokio::test]
    async fn evicted_session_closes_connection() {
        let service = make_service(1);
        let shutdown = Shutdown::new();
        let session = service.join();
        let (tx, _watcher) = mpsc::channel(8);
        assert!(
            service
                .registry()
                .register(GuestHandle::new(ConnectionId::new(), tx))
        );
        assert_eq!(service.guest_count(), 1);

        let (socket, mut peer) = fake_socket(WriteMode::Accept);
        let reason = run_connection(
            socket,
            session,
            settings(HOUR, HOUR),
            shutdown.subscribe(),
        )
        .await;

        assert_eq!(reason, CloseReason::Evicted);
        assert_eq!(service.guest_count(), 1);
        let frames = sent_frames(&mut peer);
        assert!(
            frames
                .iter()
                .any(|f| matches!(f, Message::Text(t) if t.as_str() == r#"{"guestCount":1}"#))
        );
    }

    #[tokio::test]
    async fn unanswered_ping_drops_guest() {
        let service = make_service(8);
        let shutdown = Shutdown::new();
        let (socket, mut peer) = fake_socket(WriteMode::Accept);

        let reason = tokio::time::timeout(
            Duration::from_secs(2),
            run_connection(
                socket,
                service.join(),
                settings(Duration::from_millis(20), Duration::from_millis(20)),
                shutdown.subscribe(),
            ),
        )
        .await;

        assert_eq!(reason.ok(), Some(CloseReason::PongTimeout));
        assert_eq!(service.guest_count(), 0);
        let frames = sent_frames(&mut peer);
        assert!(frames.iter().any(|f| matches!(f, Message::Ping(_))));
    }

    #[tokio::test]
    async fn answered_pings_keep_guest_connected() {
        let service = make_service(8);
        let shutdown = Shutdown::new();
        let (socket, peer) = fake_socket(WriteMode::Accept);
        let Peer {
            inbound,
            sent: mut sent_rx,
        } = peer;

        let responder = tokio::spawn(async move {
            let mut pings = 0usize;
            while let Some(frame) = sent_rx.recv().await {
                if let Message::Ping(payload) = frame {
                    pings += 1;
                    if inbound.send(Ok(Message::Pong(payload))).is_err() {
                        break;
                    }
                }
            }
            pings
        });

        let outcome = tokio::time::timeout(
            Duration::from_millis(300),
            run_connection(
                socket,
                service.join(),
                settings(Duration::from_millis(20), Duration::from_millis(40)),
                shutdown.subscribe(),
            ),
        )
        .await;

        assert!(outcome.is_err(), "connection ended early: {outcome:?}");
        assert_eq!(service.guest_count(), 0);
        let Ok(pings) = responder.await else {
            panic!("responder task failed");
        };
        assert!(pings >= 2);
    }

    #[tokio::test]
    async fn close_frame_and_read_error_end_the_loop() {
        let service = make_service(8);
        let shutdown = Shutdown::new();

        let (socket, peer) = fake_socket(WriteMode::Accept);
        let _ = peer.inbound.send(Ok(Message::Close(None)));
        let reason = run_connection(
            socket,
            service.join(),
            settings(HOUR, HOUR),
            shutdown.subscribe(),
        )
        .await;
        assert_eq!(reason, CloseReason::PeerClosed);

        let (socket, peer) = fake_socket(WriteMode::Accept);
        let _ = peer
            .inbound
            .send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        let reason = run_connection(
            socket,
            service.join(),
            settings(HOUR, HOUR),
            shutdown.subscribe(),
        )
        .await;
        assert_eq!(reason, CloseReason::ReadError);

        assert_eq!(service.guest_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_sends_close_frame() {
        let service = make_service(8);
        let shutdown = Shutdown::new();
        let (socket, mut peer) = fake_socket(WriteMode::Accept);
        shutdown.trigger();

        let reason = run_connection(
            socket,
            service.join(),
            settings(HOUR, HOUR),
            shutdown.subscribe(),
        )
        .await;

        assert_eq!(reason, CloseReason::Shutdown);
        assert_eq!(service.guest_count(), 0);
        let frames = sent_frames(&mut peer);
        assert!(frames.iter().any(|f| matches!(f, Message::Close(Some(_)))));
    }
}
