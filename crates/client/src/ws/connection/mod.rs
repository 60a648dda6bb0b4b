//! Transport boundary: connection state, generation tokens, and the traits a
//! socket implementation has to provide.
//!
//! The production implementation lives in `connection_native` and runs on
//! tokio-tungstenite. Tests plug in an in-memory transport.

use std::fmt;

use futures_channel::mpsc::UnboundedSender;
use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

use crate::error::ClientError;

/// Connection state for the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No identity has asked for a connection yet
    #[default]
    Idle,
    /// A transport is opening, or a retry is scheduled
    Connecting,
    Open,
    /// Force-closing after a transport error; the close event decides what's next
    Closing,
    /// Terminal for the current identity
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Closing)
    }

    /// A transport exists or is about to for the current identity.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        )
    }
}

/// Monotonic token identifying one transport attempt.
///
/// Every event and timer is tagged with the generation it was created for;
/// anything tagged with an older generation is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle event reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed { code: u16, reason: String },
    Error(String),
}

/// A transport event tagged with the attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: Generation,
    pub event: TransportEvent,
}

/// Where a transport reports its events.
///
/// Cloneable and cheap; each sink is bound to exactly one generation.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub fn new(generation: Generation, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    pub fn error(&self, error: impl fmt::Display) {
        self.emit(TransportEvent::Error(error.to_string()));
    }

    fn emit(&self, event: TransportEvent) {
        // The manager is gone; nobody cares about this socket anymore.
        let _ = self.tx.send(TaggedEvent {
            generation: self.generation,
            event,
        });
    }
}

/// Opens sockets.
pub trait Transport: Send + 'static {
    /// Start connecting to `url`. Progress is reported through `sink`:
    /// `opened`, then any number of `message`s, then `closed`. An `error` may
    /// come at any point and is normally followed by `closed`.
    fn open(&mut self, url: &Url, sink: EventSink) -> Box<dyn TransportHandle>;
}

/// Control side of one open (or opening) socket.
pub trait TransportHandle: Send {
    /// Queue a text frame.
    fn send(&mut self, text: String) -> Result<(), ClientError>;

    /// Close with `code` and a human-readable `reason`. Calling it again is a no-op.
    fn close(&mut self, code: u16, reason: &str);
}

/// Frame queued by a consumer, tagged with the connection it was meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub generation: Generation,
    pub text: String,
}

/// Handle for sending frames through the open connection
///
/// Only handed out while the connection is open. Frames sent after that
/// connection went away are dropped by the manager.
#[derive(Clone)]
pub struct ConnectionHandle {
    generation: Generation,
    url: Url,
    sender: UnboundedSender<OutboundFrame>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        generation: Generation,
        url: Url,
        sender: UnboundedSender<OutboundFrame>,
    ) -> Self {
        Self {
            generation,
            url,
            sender,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send a JSON-serialisable value to the server
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ClientError> {
        let text = serde_json::to_string(payload)?;
        self.send_text(text)
    }

    /// Send a raw text frame
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.sender
            .unbounded_send(OutboundFrame {
                generation: self.generation,
                text: text.into(),
            })
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("generation", &self.generation)
            .field("url", &self.url.as_str())
            .finish()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.url == other.url
    }
}

impl Eq for ConnectionHandle {}

mod connection_native;
pub use connection_native::TungsteniteTransport;

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[test]
    fn generations_are_monotonic() {
        let g0 = Generation::default();
        let g1 = g0.next();
        assert!(g1 > g0);
        assert_eq!(g1.get(), 1);
        assert_eq!(g1.to_string(), "#1");
    }

    #[test]
    fn sink_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Generation::default().next(), tx);
        sink.opened();
        sink.closed(1006, "");
        assert_eq!(
            rx.try_recv().unwrap(),
            TaggedEvent { generation: sink.generation(), event: TransportEvent::Opened }
        );
        assert!(matches!(
            rx.try_recv().unwrap().event,
            TransportEvent::Closed { code: 1006, .. }
        ));
    }

    #[test]
    fn sink_outlives_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Generation::default(), tx);
        drop(rx);
        sink.message("ignored");
    }

    #[tokio::test]
    async fn handle_serializes_and_tags() {
        let (tx, mut rx) = futures_channel::mpsc::unbounded();
        let url = Url::parse("ws://localhost/ws?userId=u1").unwrap();
        let handle = ConnectionHandle::new(Generation::default().next(), url, tx);

        handle.send(&serde_json::json!({"type": "PING"})).unwrap();
        let frame = rx.next().await.unwrap();
        assert_eq!(frame.generation, handle.generation());
        assert_eq!(frame.text, r#"{"type":"PING"}"#);

        drop(rx);
        assert!(matches!(handle.send_text("late"), Err(ClientError::ConnectionClosed)));
    }
}
