//! Native WebSocket transport using tokio-tungstenite.

use std::pin::Pin;
use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use presence_shared::{ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};
use tokio::time::Sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{EventSink, Transport, TransportHandle};
use crate::error::ClientError;

/// How long to wait for the peer to answer our close frame.
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens one tokio task per socket. Must be used inside a tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct TungsteniteTransport {
    close_timeout: Duration,
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self {
            close_timeout: CLOSE_HANDSHAKE_TIMEOUT,
        }
    }

    /// Give up on an unanswered close frame after `timeout` instead.
    pub fn with_close_timeout(timeout: Duration) -> Self {
        Self {
            close_timeout: timeout,
        }
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TungsteniteTransport {
    fn open(&mut self, url: &Url, sink: EventSink) -> Box<dyn TransportHandle> {
        let (control_tx, control_rx) = unbounded();
        tokio::spawn(run_socket(
            url.to_string(),
            sink,
            control_rx,
            self.close_timeout,
        ));
        Box::new(NativeHandle {
            control: control_tx,
            closed: false,
        })
    }
}

#[derive(Debug)]
enum Control {
    Send(String),
    Close { code: u16, reason: String },
}

struct NativeHandle {
    control: UnboundedSender<Control>,
    closed: bool,
}

impl TransportHandle for NativeHandle {
    fn send(&mut self, text: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        self.control
            .unbounded_send(Control::Send(text))
            .map_err(|e| ClientError::Transport(format!("Failed to send: {}", e)))
    }

    fn close(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.control.unbounded_send(Control::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Drive a single socket from connect to close, reporting through `sink`.
async fn run_socket(
    url: String,
    sink: EventSink,
    mut control: UnboundedReceiver<Control>,
    close_timeout: Duration,
) {
    let generation = sink.generation();

    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                crate::log_error!(%generation, error = %e, "WebSocket connect failed");
                sink.error(&e);
                sink.closed(ABNORMAL_CLOSURE, e.to_string());
                return;
            }
        },
        ctrl = control.next() => {
            // Closed (or handle dropped) before the handshake finished
            if let Some(Control::Close { code, reason }) = ctrl {
                sink.closed(code, reason);
            }
            return;
        }
    };

    crate::log_info!(%generation, "WebSocket connected");
    sink.opened();

    let (mut write, mut read) = ws_stream.split();
    let mut close_sent: Option<(u16, String)> = None;
    let mut close_deadline: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            msg_result = read.next() => match msg_result {
                Some(Ok(Message::Text(text))) => {
                    crate::log_debug!(%generation, frame = text.as_str(), "WebSocket received");
                    sink.message(text.as_str());
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                    crate::log_info!(%generation, code, reason = %reason, "WebSocket received close frame");
                    sink.closed(code, reason);
                    return;
                }
                Some(Ok(Message::Binary(data))) => {
                    crate::log_debug!(%generation, len = data.len(), "ignoring binary frame");
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite
                }
                Some(Err(e)) => {
                    match close_sent.take() {
                        Some((code, reason)) => sink.closed(code, reason),
                        None => {
                            crate::log_error!(%generation, error = %e, "WebSocket read error");
                            sink.error(&e);
                            sink.closed(ABNORMAL_CLOSURE, e.to_string());
                        }
                    }
                    return;
                }
                None => {
                    let (code, reason) = close_sent
                        .take()
                        .unwrap_or_else(|| (ABNORMAL_CLOSURE, String::new()));
                    sink.closed(code, reason);
                    return;
                }
            },
            ctrl = control.next(), if close_sent.is_none() => match ctrl {
                Some(Control::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        crate::log_error!(%generation, error = %e, "Send failed");
                    }
                }
                Some(Control::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        crate::log_debug!(%generation, error = %e, "close frame not sent");
                    }
                    close_sent = Some((code, reason));
                    close_deadline = Some(Box::pin(tokio::time::sleep(close_timeout)));
                }
                None => {
                    // Handle dropped without an explicit close
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            },
            _ = deadline_elapsed(&mut close_deadline) => {
                // Peer never answered; drop the stream without waiting further
                let (code, reason) = close_sent
                    .take()
                    .unwrap_or_else(|| (ABNORMAL_CLOSURE, String::new()));
                crate::log_warn!(%generation, code, "close handshake timed out");
                sink.closed(code, reason);
                return;
            }
        }
    }
}

async fn deadline_elapsed(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
