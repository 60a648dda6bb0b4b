//! TungsteniteTransport against a local tokio-tungstenite server.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use presence_client::ws::{
    EventSink, Generation, TaggedEvent, Transport, TransportEvent, TransportHandle,
    TungsteniteTransport,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use url::Url;

type ServerSocket = WebSocketStream<TcpStream>;

/// Accept one WebSocket on a random local port and hand it to `handler`.
async fn serve<F, Fut>(handler: F) -> Url
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    Url::parse(&format!("ws://{addr}/ws?userId=u1")).unwrap()
}

async fn drain(mut ws: ServerSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn open(
    mut transport: TungsteniteTransport,
    url: &Url,
) -> (Box<dyn TransportHandle>, mpsc::UnboundedReceiver<TaggedEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = transport.open(url, EventSink::new(Generation::default().next(), tx));
    (handle, rx)
}

/// Next event, or `None` once the socket task is gone.
async fn next_event(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> Option<TransportEvent> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("transport reported in time")
        .map(|tagged| tagged.event)
}

async fn events_until_closed(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> Vec<TransportEvent> {
    let mut events = Vec::new();
    while let Some(event) = next_event(rx).await {
        let done = matches!(event, TransportEvent::Closed { .. });
        events.push(event);
        if done {
            break;
        }
    }
    events
}

#[tokio::test]
async fn peer_close_frame_reports_code_and_reason() {
    let url = serve(|mut ws| async move {
        let _ = ws.send(Message::Text("hello".into())).await;
        let _ = ws.send(Message::Binary(vec![1u8, 2, 3].into())).await;
        let _ = ws
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "bye".into(),
            })))
            .await;
        drain(ws).await;
    })
    .await;

    let (_handle, mut rx) = open(TungsteniteTransport::new(), &url);

    // The binary frame in between is skipped
    assert_eq!(
        events_until_closed(&mut rx).await,
        vec![
            TransportEvent::Opened,
            TransportEvent::Message("hello".to_string()),
            TransportEvent::Closed {
                code: 1001,
                reason: "bye".to_string(),
            },
        ]
    );
    assert_eq!(next_event(&mut rx).await, None);
}

#[tokio::test]
async fn close_frame_without_status_reports_1005() {
    let url = serve(|mut ws| async move {
        let _ = ws.send(Message::Close(None)).await;
        drain(ws).await;
    })
    .await;

    let (_handle, mut rx) = open(TungsteniteTransport::new(), &url);

    assert_eq!(
        events_until_closed(&mut rx).await,
        vec![
            TransportEvent::Opened,
            TransportEvent::Closed {
                code: 1005,
                reason: String::new(),
            },
        ]
    );
}

#[tokio::test]
async fn connect_failure_reports_error_then_abnormal_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = Url::parse(&format!("ws://{addr}/ws?userId=u1")).unwrap();

    let (_handle, mut rx) = open(TungsteniteTransport::new(), &url);

    assert!(matches!(
        next_event(&mut rx).await,
        Some(TransportEvent::Error(_))
    ));
    assert!(matches!(
        next_event(&mut rx).await,
        Some(TransportEvent::Closed { code: 1006, .. })
    ));
    assert_eq!(next_event(&mut rx).await, None);
}

#[tokio::test]
async fn outbound_text_reaches_peer() {
    let url = serve(|mut ws| async move {
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let echo = format!("echo:{}", text.as_str());
            let _ = ws.send(Message::Text(echo.into())).await;
        }
        drain(ws).await;
    })
    .await;

    let (mut handle, mut rx) = open(TungsteniteTransport::new(), &url);
    assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Opened));

    handle.send("ping".to_string()).unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        Some(TransportEvent::Message("echo:ping".to_string()))
    );
}

#[tokio::test]
async fn client_close_completes_handshake_with_responsive_peer() {
    let url = serve(drain).await;

    let (mut handle, mut rx) = open(TungsteniteTransport::new(), &url);
    assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Opened));

    handle.close(1000, "client teardown");
    assert!(matches!(
        next_event(&mut rx).await,
        Some(TransportEvent::Closed { code: 1000, .. })
    ));
    assert_eq!(next_event(&mut rx).await, None);
}

#[tokio::test]
async fn unanswered_close_gives_up_after_timeout() {
    // Completes the handshake, then never reads again
    let url = serve(|ws| async move {
        let _held = ws;
        std::future::pending::<()>().await;
    })
    .await;

    let transport = TungsteniteTransport::with_close_timeout(Duration::from_millis(200));
    let (mut handle, mut rx) = open(transport, &url);
    assert_eq!(next_event(&mut rx).await, Some(TransportEvent::Opened));

    handle.close(1000, "client teardown");
    drop(handle);

    assert_eq!(
        next_event(&mut rx).await,
        Some(TransportEvent::Closed {
            code: 1000,
            reason: "client teardown".to_string(),
        })
    );
    // The socket task has exited and released its sink
    assert_eq!(next_event(&mut rx).await, None);
}
